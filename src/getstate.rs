/*
Copyright 2022 Volker Schwaberow <volker@schwaberow.de>
Permission is hereby granted, free of charge, to any person obtaining a
copy of this software and associated documentation files (the
"Software"), to deal in the Software without restriction, including without
limitation the rights to use, copy, modify, merge, publish, distribute,
sublicense, and/or sell copies of the Software, and to permit persons to whom the
Software is furnished to do so, subject to the following conditions:
The above copyright notice and this permission notice shall be
included in all copies or substantial portions of the Software.
THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS
OR IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF
MERCHANTABILITY, FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT
SHALL THE AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR
OTHER LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE,
ARISING FROM, OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER
DEALINGS IN THE SOFTWARE.
Author(s): Volker Schwaberow
*/

use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

/// Scan counters, updated concurrently by the probe workers.
#[derive(Debug, Default)]
pub struct GetState {
    total_probes: AtomicU64,
    completed_probes: AtomicU64,
    errored_probes: AtomicU64,
    requests_sent: AtomicU64,
    findings: AtomicU64,
    start_time: Mutex<Option<DateTime<Utc>>>,
    end_time: Mutex<Option<DateTime<Utc>>>,
}

impl GetState {
    pub fn new() -> GetState {
        GetState::default()
    }

    pub fn add_total(&self, probes: u64) {
        self.total_probes.fetch_add(probes, Ordering::Relaxed);
    }

    pub fn add_completed(&self) {
        self.completed_probes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_errored(&self) {
        self.errored_probes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_request(&self) {
        self.requests_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_finding(&self) {
        self.findings.fetch_add(1, Ordering::Relaxed);
    }

    pub fn total_probes(&self) -> u64 {
        self.total_probes.load(Ordering::Relaxed)
    }

    pub fn completed_probes(&self) -> u64 {
        self.completed_probes.load(Ordering::Relaxed)
    }

    pub fn errored_probes(&self) -> u64 {
        self.errored_probes.load(Ordering::Relaxed)
    }

    pub fn requests_sent(&self) -> u64 {
        self.requests_sent.load(Ordering::Relaxed)
    }

    pub fn findings(&self) -> u64 {
        self.findings.load(Ordering::Relaxed)
    }

    pub fn mark_started(&self) {
        if let Ok(mut start) = self.start_time.lock() {
            start.get_or_insert_with(Utc::now);
        }
    }

    pub fn mark_finished(&self) {
        if let Ok(mut end) = self.end_time.lock() {
            *end = Some(Utc::now());
        }
    }

    pub fn start_time(&self) -> Option<DateTime<Utc>> {
        self.start_time.lock().ok().and_then(|t| *t)
    }

    pub fn end_time(&self) -> Option<DateTime<Utc>> {
        self.end_time.lock().ok().and_then(|t| *t)
    }

    pub fn elapsed_ms(&self) -> Option<i64> {
        match (self.start_time(), self.end_time()) {
            (Some(start), Some(end)) => Some((end - start).num_milliseconds()),
            _ => None,
        }
    }

    pub fn summary(&self) -> String {
        let fmt = |t: Option<DateTime<Utc>>| {
            t.map_or_else(|| "-".to_string(), |t| t.format("%Y-%m-%d %H:%M:%S").to_string())
        };
        format!(
            "{} probes ({} requests). Started at {} / Ended at {}. {} ms. Completed: {}. Errored: {}. Findings: {}.",
            self.total_probes(),
            self.requests_sent(),
            fmt(self.start_time()),
            fmt(self.end_time()),
            self.elapsed_ms().unwrap_or(0),
            self.completed_probes(),
            self.errored_probes(),
            self.findings()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_counters_from_many_threads() {
        let state = Arc::new(GetState::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let state = Arc::clone(&state);
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        state.add_completed();
                        state.add_request();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(state.completed_probes(), 800);
        assert_eq!(state.requests_sent(), 800);
    }

    #[test]
    fn test_timing() {
        let state = GetState::new();
        assert!(state.elapsed_ms().is_none());
        state.mark_started();
        state.mark_finished();
        assert!(state.elapsed_ms().unwrap() >= 0);
        assert!(state.summary().contains("Findings: 0."));
    }
}
