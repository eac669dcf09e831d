//! Attrition prediction command

use anyhow::Result;
use attrition_lib::{
    BusinessTravel, EducationField, Gender, JobRole, MaritalStatus, OverTime, PredictionResult,
    RawInputRecord,
};
use clap::Args;
use colored::Colorize;
use serde::Serialize;
use tabled::Tabled;

use super::Source;
use crate::output::{
    color_leave_probability, format_probability, print_info, print_success, print_warning,
    suggestion, verdict, OutputFormat,
};

/// Employee attributes; omitted flags keep the form defaults
#[derive(Debug, Clone, Default, Args)]
pub struct PredictArgs {
    /// Age in years (18-70)
    #[arg(long)]
    pub age: Option<u32>,

    /// Monthly income (at least 1000)
    #[arg(long)]
    pub monthly_income: Option<u32>,

    /// Job satisfaction (1-4)
    #[arg(long)]
    pub job_satisfaction: Option<u32>,

    /// Environment satisfaction (1-4)
    #[arg(long)]
    pub environment_satisfaction: Option<u32>,

    /// Years at the company (0-40)
    #[arg(long)]
    pub years_at_company: Option<u32>,

    /// Work-life balance (1-4)
    #[arg(long)]
    pub work_life_balance: Option<u32>,

    /// Male or Female
    #[arg(long)]
    pub gender: Option<Gender>,

    /// Yes or No
    #[arg(long)]
    pub over_time: Option<OverTime>,

    /// Job role, e.g. "Sales Executive"
    #[arg(long)]
    pub job_role: Option<JobRole>,

    /// Education field, e.g. "Life Sciences"
    #[arg(long)]
    pub education_field: Option<EducationField>,

    /// Non-Travel, Travel_Rarely or Travel_Frequently
    #[arg(long)]
    pub business_travel: Option<BusinessTravel>,

    /// Divorced, Married or Single
    #[arg(long)]
    pub marital_status: Option<MaritalStatus>,
}

impl PredictArgs {
    /// Build the record, filling unset fields from the form defaults
    pub fn into_record(self) -> RawInputRecord {
        let defaults = RawInputRecord::default();
        RawInputRecord {
            age: self.age.unwrap_or(defaults.age),
            monthly_income: self.monthly_income.unwrap_or(defaults.monthly_income),
            job_satisfaction: self.job_satisfaction.unwrap_or(defaults.job_satisfaction),
            environment_satisfaction: self
                .environment_satisfaction
                .unwrap_or(defaults.environment_satisfaction),
            years_at_company: self.years_at_company.unwrap_or(defaults.years_at_company),
            work_life_balance: self.work_life_balance.unwrap_or(defaults.work_life_balance),
            gender: self.gender.unwrap_or(defaults.gender),
            over_time: self.over_time.unwrap_or(defaults.over_time),
            job_role: self.job_role.unwrap_or(defaults.job_role),
            education_field: self.education_field.unwrap_or(defaults.education_field),
            business_travel: self.business_travel.unwrap_or(defaults.business_travel),
            marital_status: self.marital_status.unwrap_or(defaults.marital_status),
        }
    }
}

/// Prediction as printed in JSON mode
#[derive(Debug, Serialize)]
pub struct PredictionReport {
    pub input: RawInputRecord,
    pub label: String,
    pub leave_probability: f64,
    pub stay_probability: f64,
    pub verdict: String,
    pub suggestion: &'static str,
}

impl PredictionReport {
    pub fn new(input: RawInputRecord, result: &PredictionResult) -> Self {
        Self {
            input,
            label: result.label.to_string(),
            leave_probability: result.probability,
            stay_probability: result.stay_probability(),
            verdict: verdict(result),
            suggestion: suggestion(result),
        }
    }
}

/// Row for the input table
#[derive(Tabled)]
struct InputRow {
    #[tabled(rename = "Field")]
    field: &'static str,
    #[tabled(rename = "Value")]
    value: String,
}

fn input_rows(record: &RawInputRecord) -> Vec<InputRow> {
    let mut rows: Vec<InputRow> = record
        .numeric_fields()
        .iter()
        .map(|&(field, value)| InputRow {
            field,
            value: value.to_string(),
        })
        .collect();
    rows.extend([
        (Gender::FIELD, record.gender.to_string()),
        (OverTime::FIELD, record.over_time.to_string()),
        (JobRole::FIELD, record.job_role.to_string()),
        (EducationField::FIELD, record.education_field.to_string()),
        (BusinessTravel::FIELD, record.business_travel.to_string()),
        (MaritalStatus::FIELD, record.marital_status.to_string()),
    ]
    .into_iter()
    .map(|(field, value)| InputRow { field, value }));
    rows
}

/// Predict attrition for one employee
pub async fn predict(source: &Source, args: PredictArgs, format: OutputFormat) -> Result<()> {
    let record = args.into_record();

    let result = match source {
        Source::Remote(client) => client.predict(&record).await?,
        Source::Local(pipeline) => pipeline.predict(&record)?,
    };

    match format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&PredictionReport::new(record, &result))?;
            println!("{}", json);
        }
        OutputFormat::Table => {
            println!("{}", "Attrition Prediction".bold());
            println!("{}", "=".repeat(60));

            let table = tabled::Table::new(input_rows(&record))
                .with(tabled::settings::Style::rounded())
                .to_string();
            println!("{}", table);
            println!();

            println!(
                "Leave probability: {}   Stay probability: {}",
                color_leave_probability(&result),
                format_probability(result.stay_probability())
            );
            if result.will_leave() {
                print_warning(&verdict(&result));
            } else {
                print_success(&verdict(&result));
            }
            print_info(suggestion(&result));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use attrition_lib::AttritionLabel;

    #[test]
    fn test_unset_flags_use_form_defaults() {
        assert_eq!(PredictArgs::default().into_record(), RawInputRecord::default());
    }

    #[test]
    fn test_flags_override_defaults() {
        let record = PredictArgs {
            age: Some(45),
            over_time: Some(OverTime::Yes),
            job_role: Some(JobRole::ResearchDirector),
            ..Default::default()
        }
        .into_record();

        assert_eq!(record.age, 45);
        assert_eq!(record.over_time, OverTime::Yes);
        assert_eq!(record.job_role, JobRole::ResearchDirector);
        assert_eq!(record.monthly_income, RawInputRecord::default().monthly_income);
    }

    #[test]
    fn test_input_rows_cover_every_field() {
        let rows = input_rows(&RawInputRecord::default());
        assert_eq!(rows.len(), 12);
        assert_eq!(rows[0].field, "Age");
        assert_eq!(rows[0].value, "30");
        assert_eq!(rows[11].value, "Divorced");
    }

    #[test]
    fn test_report_carries_both_probabilities() {
        let result = PredictionResult {
            label: AttritionLabel::WillLeave,
            probability: 0.6,
        };
        let report = PredictionReport::new(RawInputRecord::default(), &result);
        assert_eq!(report.label, "WillLeave");
        assert!((report.stay_probability - 0.4).abs() < 1e-9);
        assert!(report.verdict.contains("likely to leave"));
    }
}
