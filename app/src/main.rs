// Release builds run as a tray app without a console window.
#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")]

use std::path::PathBuf;

use anyhow::Context;
use ime_watcher_core::{is_module_loaded, load_config, Module, ModuleContext, Runtime};
use ime_watcher_shared_types::AppEvent;
use language_notifier::LanguageNotifierModule;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

fn init_tracing(level: &str, output: &str) {
    let env_filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    if output != "console" {
        warn!(output = %output, "logging output is not supported yet, using console");
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path = PathBuf::from("config.toml");
    let config = load_config(&config_path).context("load config")?;

    init_tracing(&config.logging.level, &config.logging.output);

    let runtime = Runtime::new(config_path, config);
    info!(
        config = %runtime.config_path.display(),
        found = runtime.config_path.exists(),
        "ime_watcher starting",
    );

    let ctx = ModuleContext {
        bus: runtime.bus.clone(),
        platform: runtime.platform.clone(),
    };

    let shutdown = runtime.bus.shutdown_requested();

    let notifier_runs = runtime.config.language_notifier.enabled
        && is_module_loaded(&runtime.config, "language_notifier");

    #[cfg(target_os = "windows")]
    let (mut host_controller, mut host_forward_join) = {
        use ime_watcher_platform::{HostEvent, HostOptions};

        if notifier_runs {
            let tray = &runtime.config.tray;
            let host = runtime
                .platform
                .start_host(HostOptions {
                    tray: tray.enabled,
                    tooltip: tray.tooltip.clone(),
                    start_hidden: tray.start_hidden,
                })
                .context("start input hooks")?;
            let (controller, events_rx) = host.into_parts();

            let bus = runtime.bus.clone();
            let forward = std::thread::spawn(move || {
                for ev in events_rx {
                    let event = match ev {
                        HostEvent::Keyboard(key) => AppEvent::Keyboard(key),
                        HostEvent::ForegroundChanged => AppEvent::ForegroundChanged,
                        HostEvent::InputLanguageChanged => AppEvent::InputLanguageChanged,
                        HostEvent::ExitRequested => AppEvent::ShutdownRequested,
                    };
                    bus.send(event);
                }
            });

            (Some(controller), Some(forward))
        } else {
            (None, None)
        }
    };

    let mut handles = Vec::new();
    let modules: Vec<Box<dyn Module>> = vec![Box::new(LanguageNotifierModule::new(
        runtime.config.language_notifier.clone(),
    ))];

    for module in modules {
        let name = module.name();
        let enabled = match name {
            "language_notifier" => notifier_runs,
            _ => false,
        };

        if !is_module_loaded(&runtime.config, name) {
            info!(module = name, "module not loaded");
            continue;
        }

        if !enabled {
            info!(module = name, "module loaded but disabled");
            continue;
        }

        info!(module = name, "starting module");
        handles.push(module.start(ctx.clone()).await?);
    }

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Ctrl+C received");
        }
        _ = shutdown => {
            info!("shutdown requested");
        }
    }

    runtime.bus.send(AppEvent::ShutdownRequested);
    for handle in handles {
        handle.join().await?;
    }

    #[cfg(target_os = "windows")]
    {
        if let Some(controller) = host_controller.take() {
            controller.stop();
        }
        if let Some(forward) = host_forward_join.take() {
            let _ = forward.join();
        }
    }

    info!("ime_watcher stopped");
    Ok(())
}
