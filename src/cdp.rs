//! Chrome DevTools Protocol backend (uses the `headless_chrome` crate)

use crate::launch::LaunchPlan;
use crate::{BrowserLauncher, BrowserSession, Error, Result, Viewport};
use headless_chrome::browser::tab::Tab;
use headless_chrome::protocol::cdp::{Emulation, Page};
use headless_chrome::{Browser, LaunchOptions};
use log::{debug, error, info, warn};
use std::ffi::OsStr;
use std::sync::Arc;
use std::time::Duration;

/// Binding the page console wrapper posts to
const CONSOLE_BINDING: &str = "__poster_console";

// Headroom over the longest wait so Chrome is not reaped as idle mid-render.
const IDLE_BROWSER_TIMEOUT: Duration = Duration::from_secs(600);

/// Launches one headless Chrome per render
#[derive(Debug, Clone, Copy, Default)]
pub struct CdpLauncher;

impl BrowserLauncher for CdpLauncher {
    type Session = CdpSession;

    fn launch(&self, plan: &LaunchPlan) -> Result<CdpSession> {
        match &plan.executable {
            Some(path) => info!("Using pre-installed Chrome at {}", path.display()),
            None => info!("Using discovered Chrome"),
        }

        let args: Vec<&OsStr> = plan.args.iter().map(OsStr::new).collect();
        let launch_options = LaunchOptions::default_builder()
            .headless(true)
            .sandbox(false)
            .window_size(Some(plan.window))
            .path(plan.executable.clone())
            .args(args)
            .idle_browser_timeout(IDLE_BROWSER_TIMEOUT)
            .build()
            .map_err(|e| Error::Launch(format!("Failed to build launch options: {}", e)))?;

        let browser = Browser::new(launch_options)
            .map_err(|e| Error::Launch(format!("Failed to launch browser: {}", e)))?;

        let tab = browser
            .new_tab()
            .map_err(|e| Error::Launch(format!("Failed to create tab: {}", e)))?;

        tab.set_default_timeout(plan.command_timeout);
        let session = CdpSession {
            browser: Some(browser),
            tab,
            command_timeout: plan.command_timeout,
        };
        session.forward_console(plan.debug);
        Ok(session)
    }
}

/// A launched browser and its single tab
pub struct CdpSession {
    browser: Option<Browser>,
    tab: Arc<Tab>,
    command_timeout: Duration,
}

impl CdpSession {
    /// Forward page console output to the log. Warnings and errors always
    /// pass; other levels only in debug mode.
    fn forward_console(&self, debug_mode: bool) {
        let exposed = self.tab.expose_function(
            CONSOLE_BINDING,
            Arc::new(move |payload: serde_json::Value| {
                // payload may arrive as a JSON string
                let msg = match payload.as_str() {
                    Some(s) => serde_json::from_str::<serde_json::Value>(s)
                        .unwrap_or_else(|_| serde_json::Value::String(s.to_string())),
                    None => payload,
                };
                let level = msg.get("level").and_then(|l| l.as_str()).unwrap_or("log");
                let text = match msg.get("args").and_then(|a| a.as_array()) {
                    Some(args) => args
                        .iter()
                        .map(|v| v.as_str().map(str::to_string).unwrap_or_else(|| v.to_string()))
                        .collect::<Vec<_>>()
                        .join(" "),
                    None => String::new(),
                };
                match level {
                    "error" => error!("[BROWSER ERROR]: {}", text),
                    "warn" => warn!("[BROWSER WARNING]: {}", text),
                    other if debug_mode => info!("[BROWSER {}]: {}", other.to_uppercase(), text),
                    _ => {}
                }
            }),
        );
        if let Err(e) = exposed {
            warn!("Failed to expose console binding: {}", e);
            return;
        }

        let wrapper = format!(
            r#"(function(){{
            const bind = window.{binding};
            if (!bind) return;
            ['log','info','warn','error'].forEach(function(k){{
                const orig = console[k];
                console[k] = function(...args){{
                    try{{ bind(JSON.stringify({{ level:k, args: args.map(a=>String(a)) }})); }}catch(e){{}}
                    try{{ orig.apply(console, args); }}catch(e){{}}
                }};
            }});
            window.addEventListener('error', function(ev){{
                try{{ bind(JSON.stringify({{ level:'error', args: ['[PAGE ERROR] ' + ev.message] }})); }}catch(e){{}}
            }});
        }})();"#,
            binding = CONSOLE_BINDING
        );

        if let Err(e) = self.tab.call_method(Page::AddScriptToEvaluateOnNewDocument {
            source: wrapper,
            world_name: None,
            include_command_line_api: None,
            run_immediately: None,
        }) {
            warn!("Failed to inject console wrapper: {}", e);
        }
    }
}

impl BrowserSession for CdpSession {
    fn set_viewport(&mut self, viewport: &Viewport) -> Result<()> {
        self.tab
            .call_method(device_metrics(viewport))
            .map_err(|e| Error::Other(format!("Failed to set viewport: {}", e)))?;
        Ok(())
    }

    fn navigate(&mut self, url: &str, timeout: Duration) -> Result<()> {
        let timeout_ms = timeout.as_millis() as u64;
        // The tab timeout is shared by every command, so the navigation bound
        // must not outlive the navigation.
        self.tab.set_default_timeout(timeout);
        let navigated = self
            .tab
            .navigate_to(url)
            .map_err(|e| Error::NavigationTimeout {
                timeout_ms,
                message: format!("Navigation failed: {}", e),
            })
            .and_then(|tab| {
                tab.wait_until_navigated().map_err(|e| Error::NavigationTimeout {
                    timeout_ms,
                    message: format!("Wait for navigation failed: {}", e),
                })
            });
        self.tab.set_default_timeout(self.command_timeout);
        navigated.map(|_| ())
    }

    fn evaluate(&mut self, script: &str) -> Result<serde_json::Value> {
        let result = self
            .tab
            .evaluate(script, true)
            .map_err(|e| Error::Script(format!("Evaluation failed: {}", e)))?;
        Ok(result.value.unwrap_or(serde_json::Value::Null))
    }

    fn screenshot_png(&mut self) -> Result<Vec<u8>> {
        self.tab
            .capture_screenshot(Page::CaptureScreenshotFormatOption::Png, None, None, true)
            .map_err(|e| Error::Capture(format!("Screenshot failed: {}", e)))
    }

    fn close(&mut self) -> Result<()> {
        // Dropping the browser kills the child process.
        if let Some(browser) = self.browser.take() {
            debug!("Terminating browser process");
            drop(browser);
        }
        Ok(())
    }
}

/// Viewport emulation command; the optional overrides stay unset
fn device_metrics(viewport: &Viewport) -> Emulation::SetDeviceMetricsOverride {
    Emulation::SetDeviceMetricsOverride {
        width: viewport.width,
        height: viewport.height,
        device_scale_factor: viewport.device_scale_factor,
        mobile: false,
        scale: None,
        screen_width: None,
        screen_height: None,
        position_x: None,
        position_y: None,
        dont_set_visible_size: None,
        screen_orientation: None,
        viewport: None,
        display_feature: None,
        device_posture: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::launch::LaunchSettings;

    #[test]
    fn test_device_metrics_match_viewport() {
        let cmd = device_metrics(&Viewport {
            width: 18897,
            height: 4724,
            device_scale_factor: 1.0,
        });
        assert_eq!(cmd.width, 18897);
        assert_eq!(cmd.height, 4724);
        assert_eq!(cmd.device_scale_factor, 1.0);
        assert!(!cmd.mobile);
        assert!(cmd.scale.is_none());
        assert!(cmd.viewport.is_none());
    }

    #[test]
    fn test_cdp_launch_and_close() {
        // This test requires Chrome to be installed, so we skip it in CI
        if std::env::var("CI").is_ok() {
            return;
        }
        let plan = LaunchPlan::new(&LaunchSettings::from_env(), (320, 240), false);
        let mut session = match CdpLauncher.launch(&plan) {
            Ok(s) => s,
            Err(e) => {
                eprintln!("Skipping CDP launch test because Chrome is not available or failed to launch: {}", e);
                return;
            }
        };
        assert!(session.close().is_ok());
        assert!(session.close().is_ok());
    }
}
