// Use mimalloc as the global allocator
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use std::process::ExitCode;

use tracing::error;

use ssh_copy_action::config::Settings;
use ssh_copy_action::deadline::Watchdog;
use ssh_copy_action::error::ActionError;

#[tokio::main]
async fn main() -> ExitCode {
    ssh_copy_action::init_tracing();

    let settings = match Settings::from_env() {
        Ok(settings) => settings,
        Err(e) => return fail(ActionError::from(e)),
    };

    // Hard stop: no cleanup runs once the deadline passes
    let _watchdog = match Watchdog::arm(settings.action_timeout, |_| std::process::exit(1)) {
        Ok(watchdog) => watchdog,
        Err(e) => {
            error!("Failed to start deadline watchdog: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match ssh_copy_action::run(&settings).await {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => fail(e),
    }
}

fn fail(e: ActionError) -> ExitCode {
    error!("Failed at {} stage: {}", e.stage(), e);
    ExitCode::FAILURE
}
