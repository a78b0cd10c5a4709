#[macro_use]
extern crate tracing;

mod app;
pub mod logging;

pub use app::App;
pub use bindstats_config::{
    Args,
    Config,
};
use color_eyre::Result;
pub use logging::init_logging;

/// Installs the error report and panic handlers.
///
/// Debug builds print a full backtrace, release builds write a crash report.
pub fn init_errors() -> Result<()> {
    let (panic_hook, eyre_hook) = color_eyre::config::HookBuilder::default()
        .display_env_section(false)
        .into_hooks();
    eyre_hook.install()?;

    std::panic::set_hook(Box::new(move |info| {
        #[cfg(not(debug_assertions))]
        {
            use human_panic::{
                handle_dump,
                print_msg,
                Metadata,
            };
            let metadata = Metadata::new(env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
            let file_path = handle_dump(&metadata, info);
            let _ = print_msg(file_path, &metadata);
        }
        error!("{}", panic_hook.panic_report(info));

        #[cfg(debug_assertions)]
        {
            better_panic::Settings::auto()
                .most_recent_first(false)
                .lineno_suffix(true)
                .verbosity(better_panic::Verbosity::Full)
                .create_panic_handler()(info);
        }

        std::process::exit(1);
    }));
    Ok(())
}
