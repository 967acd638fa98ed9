//! Calendar utility.

use super::{parse_args, Tool, ToolOutput};
use crate::context::TurnContext;
use crate::error::Result;
use crate::llm::ToolSpec;
use async_trait::async_trait;
use chrono::{Datelike, Duration, Local, NaiveDate};
use serde::Deserialize;
use serde_json::{json, Value};

const OPERATIONS: &str = "today, day_of_week, days_between, add_days, subtract_days, \
current_weekday, is_leap_year, month_days, week_number";

const MONTHS: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

/// Date calculator tool.
pub struct DateTool;

#[derive(Deserialize)]
struct DateArgs {
    operation: String,
    #[serde(default)]
    date_input: String,
}

#[async_trait]
impl Tool for DateTool {
    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: "date_calculator".to_string(),
            description: "Get today's date, find the day of the week for a date, count days \
                between dates, add or subtract days, check leap years, get the number of days \
                in a month, or the ISO week number of a date. Operations: today, day_of_week, \
                days_between, add_days, subtract_days, current_weekday, is_leap_year, \
                month_days, week_number."
                .to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "operation": {
                        "type": "string",
                        "enum": [
                            "today", "day_of_week", "days_between", "add_days", "subtract_days",
                            "current_weekday", "is_leap_year", "month_days", "week_number"
                        ]
                    },
                    "date_input": {
                        "type": "string",
                        "description": "\"YYYY-MM-DD\", \"YYYY-MM-DD,YYYY-MM-DD\", \"YYYY-MM-DD,days\", \"YYYY\" or \"YYYY,MM\" depending on the operation"
                    }
                },
                "required": ["operation"]
            }),
        }
    }

    fn usage_notice(&self) -> String {
        "Checking the calendar".to_string()
    }

    async fn call(&self, arguments: &Value, _ctx: &TurnContext) -> Result<ToolOutput> {
        let args: DateArgs = parse_args("date_calculator", arguments)?;
        let today = Local::now().date_naive();
        Ok(ToolOutput::text(date_operation(
            &args.operation,
            &args.date_input,
            today,
        )))
    }
}

/// Run one date operation relative to `today`. Always returns display text;
/// failures are reported as `Error: ...` strings.
pub fn date_operation(operation: &str, input: &str, today: NaiveDate) -> String {
    let input = input.trim();
    let missing = |message: &str| format!("Error: Please provide {}", message);

    let result = match operation {
        "today" => Ok(with_weekday(today)),
        "current_weekday" => Ok(today.format("%A").to_string()),
        "day_of_week" if input.is_empty() => return missing("a date in YYYY-MM-DD format"),
        "day_of_week" => parse_date(input).map(|d| d.format("%A").to_string()),
        "days_between" => match input.split_once(',') {
            None => return missing("two dates separated by comma (YYYY-MM-DD,YYYY-MM-DD)"),
            Some((a, b)) => parse_date(a)
                .and_then(|a| parse_date(b).map(|b| (b - a).num_days().abs()))
                .map(|days| format!("{} days", days)),
        },
        "add_days" | "subtract_days" => match input.split_once(',') {
            None => return missing("date and number of days (YYYY-MM-DD,number)"),
            Some((date, days)) => parse_date(date).and_then(|date| {
                let days = parse_int(days)?;
                Duration::try_days(days)
                    .and_then(|delta| match operation {
                        "add_days" => date.checked_add_signed(delta),
                        _ => date.checked_sub_signed(delta),
                    })
                    .map(with_weekday)
                    .ok_or_else(|| "date out of range".to_string())
            }),
        },
        "is_leap_year" if input.is_empty() => return missing("a year"),
        "is_leap_year" => parse_int(input).map(|year| {
            if is_leap(year) {
                format!("Yes, {} is a leap year", year)
            } else {
                format!("No, {} is not a leap year", year)
            }
        }),
        "month_days" => match input.split_once(',') {
            None => return missing("year and month (YYYY,MM)"),
            Some((year, month)) => parse_int(year).and_then(|year| {
                let month = parse_int(month)?;
                let days = days_in_month(year, month)?;
                Ok(format!("{} {} has {} days", MONTHS[(month - 1) as usize], year, days))
            }),
        },
        "week_number" if input.is_empty() => return missing("a date in YYYY-MM-DD format"),
        "week_number" => parse_date(input)
            .map(|d| format!("Week {} of {}", d.iso_week().week(), d.year())),
        other => {
            return format!(
                "Error: Unsupported operation '{}'. Supported operations: {}",
                other, OPERATIONS
            )
        }
    };

    result.unwrap_or_else(|reason| {
        format!(
            "Error: Invalid date format or input. Please use YYYY-MM-DD format. {}",
            reason
        )
    })
}

fn with_weekday(date: NaiveDate) -> String {
    date.format("%Y-%m-%d (%A)").to_string()
}

fn parse_date(value: &str) -> std::result::Result<NaiveDate, String> {
    let value = value.trim();
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|e| format!("'{}' does not match YYYY-MM-DD: {}", value, e))
}

fn parse_int(value: &str) -> std::result::Result<i64, String> {
    let value = value.trim();
    value
        .parse::<i64>()
        .map_err(|_| format!("invalid number '{}'", value))
}

fn is_leap(year: i64) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}

fn days_in_month(year: i64, month: i64) -> std::result::Result<u32, String> {
    if !(1..=12).contains(&month) {
        return Err(format!("month must be in 1..12, got {}", month));
    }
    Ok(match month {
        2 if is_leap(year) => 29,
        2 => 28,
        4 | 6 | 9 | 11 => 30,
        _ => 31,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 8, 18).unwrap()
    }

    #[test]
    fn test_today_and_weekday() {
        assert_eq!(date_operation("today", "", today()), "2025-08-18 (Monday)");
        assert_eq!(date_operation("current_weekday", "", today()), "Monday");
        assert_eq!(date_operation("day_of_week", "2025-12-25", today()), "Thursday");
    }

    #[test]
    fn test_arithmetic() {
        assert_eq!(
            date_operation("days_between", "2025-12-25, 2025-08-18", today()),
            "129 days"
        );
        assert_eq!(
            date_operation("add_days", "2025-08-18,10", today()),
            "2025-08-28 (Thursday)"
        );
        assert_eq!(
            date_operation("subtract_days", "2025-03-01,1", today()),
            "2025-02-28 (Friday)"
        );
    }

    #[test]
    fn test_calendar_facts() {
        assert_eq!(date_operation("is_leap_year", "2024", today()), "Yes, 2024 is a leap year");
        assert_eq!(date_operation("is_leap_year", "1900", today()), "No, 1900 is not a leap year");
        assert_eq!(date_operation("month_days", "2024,2", today()), "February 2024 has 29 days");
        assert_eq!(date_operation("month_days", "2025,04", today()), "April 2025 has 30 days");
        assert_eq!(date_operation("week_number", "2025-08-18", today()), "Week 34 of 2025");
    }

    #[test]
    fn test_errors() {
        assert_eq!(
            date_operation("day_of_week", "", today()),
            "Error: Please provide a date in YYYY-MM-DD format"
        );
        assert_eq!(
            date_operation("days_between", "2025-08-18", today()),
            "Error: Please provide two dates separated by comma (YYYY-MM-DD,YYYY-MM-DD)"
        );
        assert!(date_operation("day_of_week", "18/08/2025", today())
            .starts_with("Error: Invalid date format or input. Please use YYYY-MM-DD format."));
        assert!(date_operation("month_days", "2025,13", today()).starts_with("Error: Invalid"));
        assert_eq!(
            date_operation("tomorrow", "", today()),
            format!("Error: Unsupported operation 'tomorrow'. Supported operations: {}", OPERATIONS)
        );
    }

    #[test]
    fn test_extreme_day_counts() {
        for op in ["add_days", "subtract_days"] {
            for days in [i64::MIN, i64::MAX] {
                let out = date_operation(op, &format!("2025-08-18,{}", days), today());
                assert!(out.starts_with("Error: Invalid"), "{} {} gave {}", op, days, out);
                assert!(out.contains("date out of range"));
            }
        }
    }
}
