//! Scripted browser backend shared by the pipeline tests

#![allow(dead_code)]

use mapposter::template::ENTRY_POINT;
use mapposter::{BrowserLauncher, BrowserSession, Error, LaunchPlan, RenderOptions, Result, Viewport};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// PNG signature plus a few bytes; enough for a non-empty output file
pub const FAKE_PNG: &[u8] = b"\x89PNG\r\n\x1a\nfake";

/// Pipeline stage at which the mock browser fails
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailAt {
    Launch,
    Viewport,
    Navigate,
    /// The page lacks the initializer
    Inject,
    /// The completion flag is never raised
    Complete,
    Screenshot,
}

#[derive(Debug, Default)]
pub struct Record {
    pub launches: Vec<LaunchPlan>,
    pub viewports: Vec<Viewport>,
    pub urls: Vec<String>,
    pub scripts: Vec<String>,
    pub probes: usize,
    pub screenshots: usize,
    pub closes: usize,
    /// When a probe first saw the completion flag
    pub flag_seen_at: Option<Instant>,
    pub screenshot_at: Option<Instant>,
}

#[derive(Clone, Default)]
pub struct MockLauncher {
    pub fail_at: Option<FailAt>,
    /// Probes answered `false` before the flag is raised
    pub probes_before_complete: usize,
    pub record: Arc<Mutex<Record>>,
}

impl MockLauncher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_at(stage: FailAt) -> Self {
        Self {
            fail_at: Some(stage),
            ..Self::default()
        }
    }

    pub fn closes(&self) -> usize {
        self.record.lock().unwrap().closes
    }

    pub fn launches(&self) -> usize {
        self.record.lock().unwrap().launches.len()
    }
}

impl BrowserLauncher for MockLauncher {
    type Session = MockSession;

    fn launch(&self, plan: &LaunchPlan) -> Result<MockSession> {
        self.record.lock().unwrap().launches.push(plan.clone());
        if self.fail_at == Some(FailAt::Launch) {
            return Err(Error::Launch("chrome not found".into()));
        }
        Ok(MockSession {
            fail_at: self.fail_at,
            probes_before_complete: self.probes_before_complete,
            record: Arc::clone(&self.record),
        })
    }
}

pub struct MockSession {
    fail_at: Option<FailAt>,
    probes_before_complete: usize,
    record: Arc<Mutex<Record>>,
}

impl BrowserSession for MockSession {
    fn set_viewport(&mut self, viewport: &Viewport) -> Result<()> {
        self.record.lock().unwrap().viewports.push(*viewport);
        if self.fail_at == Some(FailAt::Viewport) {
            return Err(Error::Other("emulation rejected".into()));
        }
        Ok(())
    }

    fn navigate(&mut self, url: &str, timeout: Duration) -> Result<()> {
        self.record.lock().unwrap().urls.push(url.to_string());
        if self.fail_at == Some(FailAt::Navigate) {
            return Err(Error::NavigationTimeout {
                timeout_ms: timeout.as_millis() as u64,
                message: "net::ERR_TIMED_OUT".into(),
            });
        }
        Ok(())
    }

    fn evaluate(&mut self, script: &str) -> Result<Value> {
        let mut record = self.record.lock().unwrap();
        if script.contains(ENTRY_POINT) {
            record.scripts.push(script.to_string());
            return Ok(json!(self.fail_at != Some(FailAt::Inject)));
        }
        record.probes += 1;
        let done = self.fail_at != Some(FailAt::Complete) && record.probes > self.probes_before_complete;
        if done && record.flag_seen_at.is_none() {
            record.flag_seen_at = Some(Instant::now());
        }
        Ok(json!(done))
    }

    fn screenshot_png(&mut self) -> Result<Vec<u8>> {
        let mut record = self.record.lock().unwrap();
        record.screenshots += 1;
        record.screenshot_at = Some(Instant::now());
        drop(record);
        if self.fail_at == Some(FailAt::Screenshot) {
            return Err(Error::Other("Target closed".into()));
        }
        Ok(FAKE_PNG.to_vec())
    }

    fn close(&mut self) -> Result<()> {
        self.record.lock().unwrap().closes += 1;
        Ok(())
    }
}

/// Short waits so failure paths finish quickly
pub fn fast_options(job_id: &str) -> RenderOptions {
    RenderOptions {
        job_id: job_id.to_string(),
        timeout_ms: 50,
        navigation_timeout_ms: 1_000,
        poll_interval_ms: 5,
        stabilization_ms: 0,
        ..RenderOptions::default()
    }
}

/// 80x60cm at 200 DPI, single circular map over Miami
pub fn miami_poster() -> Value {
    json!({
        "print": {"widthCm": 80, "heightCm": 60, "dpi": 200},
        "layout": {"type": "single", "shape": "circle"},
        "maps": [{
            "center": [-80.1918, 25.7617],
            "zoom": 13,
            "style": "minimal",
            "containerWidth": 640,
            "containerHeight": 640
        }]
    })
}

pub fn triple_config() -> Value {
    let map = |lng: f64| {
        json!({
            "center": [lng, 40.0],
            "zoom": 11,
            "style": "positron",
            "containerWidth": 320,
            "containerHeight": 480,
            "markers": [{"coordinates": [lng, 40.0], "icon": "heart", "color": "#e11d48"}]
        })
    };
    json!({
        "layout": {"type": "triple", "shape": "square"},
        "maps": [map(-3.7), map(2.35), map(12.5)],
        "print": {"widthCm": 30, "heightCm": 20, "dpi": 150, "orientation": "landscape"}
    })
}
