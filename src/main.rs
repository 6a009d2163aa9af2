use anyhow::{Context, bail};
use serde::Serialize;

use rucaptcha::config::SolverConfig;
use rucaptcha::{CaptchaSolver, SolveResult, TaskId};

const USAGE: &str = "usage:
  rucaptcha image <path-or-url>
  rucaptcha recaptcha <site-key> <page-url>
  rucaptcha recaptcha-v3 <site-key> <page-url> <action>
  rucaptcha complain <task-id>";

/// JSON line printed on stdout for every command.
#[derive(Debug, Serialize)]
struct Report {
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    answer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    task_id: Option<TaskId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl From<SolveResult> for Report {
    fn from(result: SolveResult) -> Self {
        match result {
            Ok(solution) => Self {
                status: "success",
                answer: Some(solution.answer),
                task_id: Some(solution.task_id),
                error: None,
            },
            Err(failure) => Self {
                status: "error",
                answer: None,
                task_id: failure.task_id,
                error: Some(failure.error.to_string()),
            },
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    dotenvy::dotenv().ok();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let args: Vec<&str> = args.iter().map(String::as_str).collect();

    let known = matches!(
        args.as_slice(),
        ["image", _] | ["recaptcha", _, _] | ["recaptcha-v3", _, _, _] | ["complain", _]
    );
    if !known {
        bail!("{USAGE}");
    }

    let config = SolverConfig::load().context("loading solver config")?;
    let solver = CaptchaSolver::new(config).context("building solver")?;

    let report = match args.as_slice() {
        ["image", location] => Report::from(solver.solve_image(location).await),
        ["recaptcha", site_key, page_url] => {
            Report::from(solver.solve_recaptcha(site_key, page_url).await)
        }
        ["recaptcha-v3", site_key, page_url, action] => {
            Report::from(solver.solve_recaptcha_v3(site_key, page_url, action).await)
        }
        ["complain", task_id] => {
            let task_id = TaskId::from(*task_id);
            match solver.complain(&task_id).await {
                Ok(()) => Report {
                    status: "success",
                    answer: None,
                    task_id: Some(task_id),
                    error: None,
                },
                Err(e) => Report {
                    status: "error",
                    answer: None,
                    task_id: Some(task_id),
                    error: Some(e.to_string()),
                },
            }
        }
        _ => bail!("{USAGE}"),
    };

    println!("{}", serde_json::to_string(&report)?);

    if report.status != "success" {
        tracing::error!("command failed");
        std::process::exit(1);
    }
    Ok(())
}
