use std::path::Path;

use is_terminal::IsTerminal;
use owo_colors::OwoColorize;

use crate::service::ServiceState;

pub struct ServiceSummary {
    pub name: String,
    pub port: Option<u16>,
    pub state: ServiceState,
}

fn use_color() -> bool {
    std::io::stdout().is_terminal()
}

fn status_dot(state: ServiceState, color: bool) -> String {
    if !color {
        return format!("* {}", state);
    }
    match state {
        ServiceState::Ready => format!("{} {}", "●".green(), state),
        ServiceState::Degraded | ServiceState::Starting => {
            format!("{} {}", "●".yellow(), state)
        }
        ServiceState::NotStarted | ServiceState::Stopped => {
            format!("{} {}", "●".red(), state)
        }
    }
}

/// Human-facing startup banner printed once all services have been brought
/// up (or skipped). Structured logs carry the same facts for the log file.
pub fn print_startup_summary(services: &[ServiceSummary], kill_file: &Path) {
    let color = use_color();
    let name_width = services
        .iter()
        .map(|s| s.name.len())
        .max()
        .unwrap_or(0)
        .max(7);

    println!();
    if color {
        println!("  {}", "studiod is running".bold());
    } else {
        println!("  studiod is running");
    }
    println!();
    for svc in services {
        let addr = match svc.port {
            Some(port) => format!("http://localhost:{}", port),
            None => "-".to_string(),
        };
        println!(
            "  {:<name_width$}  {:<24}  {}",
            svc.name,
            addr,
            status_dot(svc.state, color),
        );
    }
    println!();
    println!("  Emergency stop: create '{}'", kill_file.display());
    println!("  Press Ctrl+C to stop");
    println!();
}
