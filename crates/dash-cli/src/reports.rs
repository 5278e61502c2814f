//! The five fixed dashboard reports

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChartKind {
    Bubble,
    Heatmap,
    Line,
    Bar,
    Donut,
}

impl fmt::Display for ChartKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ChartKind::Bubble => "bubble",
            ChartKind::Heatmap => "heatmap",
            ChartKind::Line => "line",
            ChartKind::Bar => "bar",
            ChartKind::Donut => "donut",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Report {
    pub id: &'static str,
    pub title: &'static str,
    pub chart: ChartKind,
    /// Numeric column the chart is sized or colored by
    pub measure: &'static str,
    pub sql: &'static str,
}

pub const REPORTS: [Report; 5] = [
    Report {
        id: "top-titles",
        title: "Top 10 most posted job titles (with industry)",
        chart: ChartKind::Bubble,
        measure: "cnt",
        sql: r#"
WITH counts AS (
  SELECT jp.title AS title,
         ji.industry_id AS industry,
         COUNT(*) AS cnt
    FROM raw.job_postings jp
    JOIN raw.job_industries ji ON jp.job_id = ji.job_id
   GROUP BY jp.title, ji.industry_id
)
SELECT title, industry, cnt
  FROM counts
 ORDER BY cnt DESC
 LIMIT 10
"#,
    },
    Report {
        id: "top-salaries",
        title: "Top 10 best paid job titles (with industry)",
        chart: ChartKind::Heatmap,
        measure: "avg_salary",
        sql: r#"
WITH salaries AS (
  SELECT jp.title          AS title,
         ji.industry_id    AS industry,
         AVG(jp.max_salary) AS avg_salary
    FROM raw.job_postings jp
    JOIN raw.job_industries ji ON jp.job_id = ji.job_id
   WHERE jp.max_salary IS NOT NULL
   GROUP BY jp.title, ji.industry_id
)
SELECT title, industry, avg_salary
  FROM salaries
 ORDER BY avg_salary DESC
 LIMIT 10
"#,
    },
    Report {
        id: "company-size",
        title: "Job postings by company size",
        chart: ChartKind::Line,
        measure: "postings_count",
        sql: r#"
SELECT ec.employee_count AS employee_count,
       COUNT(jp.job_id)   AS postings_count
  FROM raw.employee_counts ec
  LEFT JOIN raw.companies c
    ON ec.company_id = c.company_id
  LEFT JOIN raw.job_postings jp
    ON LOWER(TRIM(jp.company_name)) = LOWER(TRIM(c.name))
 GROUP BY ec.employee_count
 ORDER BY ec.employee_count
"#,
    },
    Report {
        id: "industries",
        title: "Job postings by industry",
        chart: ChartKind::Bar,
        measure: "cnt",
        sql: r#"
SELECT ji.industry_id AS industry,
       COUNT(*)        AS cnt
  FROM raw.job_postings jp
  JOIN raw.job_industries ji ON jp.job_id = ji.job_id
 GROUP BY ji.industry_id
 ORDER BY cnt DESC
"#,
    },
    Report {
        id: "work-types",
        title: "Job postings by work type (full-time, internship, part-time)",
        chart: ChartKind::Donut,
        measure: "cnt",
        sql: r#"
SELECT formatted_work_type AS work_type,
       COUNT(*)            AS cnt
  FROM raw.job_postings
 GROUP BY formatted_work_type
 ORDER BY cnt DESC
"#,
    },
];

pub fn find(id: &str) -> Option<&'static Report> {
    REPORTS.iter().find(|r| r.id.eq_ignore_ascii_case(id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_report_ids_unique() {
        let ids: HashSet<_> = REPORTS.iter().map(|r| r.id).collect();
        assert_eq!(ids.len(), REPORTS.len());
    }

    #[test]
    fn test_measure_appears_in_query() {
        for report in &REPORTS {
            assert!(
                report.sql.contains(report.measure),
                "{} does not select {}",
                report.id,
                report.measure
            );
        }
    }

    #[test]
    fn test_find() {
        assert_eq!(find("work-types").map(|r| r.chart), Some(ChartKind::Donut));
        assert_eq!(find("TOP-TITLES").map(|r| r.chart), Some(ChartKind::Bubble));
        assert!(find("unknown").is_none());
    }
}
