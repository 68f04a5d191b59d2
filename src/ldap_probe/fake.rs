//! Scripted in-memory directory used by the probe and scheduler tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::{Instant, sleep};
use url::Url;

use super::client::{DirectoryClient, DirectorySession, SearchRequest};
use super::error::DirectoryError;

/// Behaviour of a single phase in a scripted cycle.
#[derive(Debug, Clone, Copy)]
pub enum Step {
    Ok(Duration),
    Fail(Duration, u32),
}

impl Step {
    async fn run(self) -> Result<(), DirectoryError> {
        match self {
            Step::Ok(delay) => {
                sleep(delay).await;
                Ok(())
            }
            Step::Fail(delay, rc) => {
                sleep(delay).await;
                Err(DirectoryError::Result {
                    rc,
                    text: "scripted failure".to_string(),
                })
            }
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Cycle {
    pub connect: Step,
    pub bind: Step,
    pub search: Step,
}

impl Cycle {
    pub fn ok(delay: Duration) -> Self {
        Self {
            connect: Step::Ok(delay),
            bind: Step::Ok(delay),
            search: Step::Ok(delay),
        }
    }
}

#[derive(Debug, Default)]
pub struct Calls {
    pub connect_started: Vec<Instant>,
    pub binds: Vec<(String, String)>,
    pub searches: Vec<(String, String, Vec<String>)>,
    pub opened: usize,
    pub closed: usize,
}

impl Calls {
    pub fn open_sessions(&self) -> usize {
        self.opened - self.closed
    }
}

/// Replays `script` cycle by cycle, repeating `fallback` once it runs out.
#[derive(Clone)]
pub struct FakeDirectory {
    script: Arc<Mutex<VecDeque<Cycle>>>,
    fallback: Cycle,
    pub calls: Arc<Mutex<Calls>>,
}

impl FakeDirectory {
    pub fn new(script: impl IntoIterator<Item = Cycle>, fallback: Cycle) -> Self {
        Self {
            script: Arc::new(Mutex::new(script.into_iter().collect())),
            fallback,
            calls: Arc::new(Mutex::new(Calls::default())),
        }
    }

    pub fn always(cycle: Cycle) -> Self {
        Self::new([], cycle)
    }
}

pub struct FakeSession {
    cycle: Cycle,
    calls: Arc<Mutex<Calls>>,
}

#[async_trait]
impl DirectoryClient for FakeDirectory {
    type Session = FakeSession;

    async fn connect(&self, _url: &Url) -> Result<FakeSession, DirectoryError> {
        let cycle = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(self.fallback);
        self.calls.lock().unwrap().connect_started.push(Instant::now());

        cycle.connect.run().await?;
        self.calls.lock().unwrap().opened += 1;
        Ok(FakeSession {
            cycle,
            calls: Arc::clone(&self.calls),
        })
    }
}

#[async_trait]
impl DirectorySession for FakeSession {
    async fn bind(&mut self, principal: &str, credential: &str) -> Result<(), DirectoryError> {
        self.calls
            .lock()
            .unwrap()
            .binds
            .push((principal.to_string(), credential.to_string()));
        self.cycle.bind.run().await
    }

    async fn search(&mut self, request: &SearchRequest<'_>) -> Result<Vec<String>, DirectoryError> {
        self.calls.lock().unwrap().searches.push((
            request.base.to_string(),
            request.filter.to_string(),
            request.attributes.to_vec(),
        ));
        self.cycle.search.run().await?;
        Ok(vec![format!("cn=probe,{}", request.base)])
    }

    async fn close(&mut self) {
        self.calls.lock().unwrap().closed += 1;
    }
}
