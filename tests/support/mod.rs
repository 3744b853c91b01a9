//! In-memory driver that records every call, scripted per test.
//!
//! The engine is process-wide, so every test binary installs the same
//! [`StubConnector`] once. Each test runs its body through [`run`], which puts a
//! fresh [`Script`] in task-local storage; connections opened by that task write
//! their events to it.

#![allow(dead_code)]

use async_trait::async_trait;
use log::LevelFilter;
use sqlx_context_db::driver::{Connection, Connector, Placeholder, ResultSet};
use sqlx_context_db::{init_engine, Engine, Error, Result, Value};
use std::collections::VecDeque;
use std::env;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Once};

tokio::task_local! {
    static SCRIPT: Arc<Script>;
}

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Connect(usize),
    Execute(usize, String, Vec<Value>),
    Commit(usize),
    Rollback(usize),
    Close(usize),
}

#[derive(Default)]
pub struct Script {
    events: Mutex<Vec<Event>>,
    results: Mutex<VecDeque<Result<ResultSet>>>,
    connections: AtomicUsize,
    pub fail_commit: AtomicBool,
    pub fail_rollback: AtomicBool,
}

impl Script {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Queues the outcome of the next `execute`; unqueued calls return an empty set.
    pub fn respond(&self, result: ResultSet) {
        self.results.lock().unwrap().push_back(Ok(result));
    }

    pub fn fail_next(&self, message: &str) {
        self.results
            .lock()
            .unwrap()
            .push_back(Err(driver_error(message)));
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    pub fn count(&self, pred: impl Fn(&Event) -> bool) -> usize {
        self.events().iter().filter(|e| pred(e)).count()
    }

    pub fn connects(&self) -> usize {
        self.count(|e| matches!(e, Event::Connect(_)))
    }

    pub fn closes(&self) -> usize {
        self.count(|e| matches!(e, Event::Close(_)))
    }

    pub fn commits(&self) -> usize {
        self.count(|e| matches!(e, Event::Commit(_)))
    }

    pub fn rollbacks(&self) -> usize {
        self.count(|e| matches!(e, Event::Rollback(_)))
    }

    pub fn statements(&self) -> Vec<(String, Vec<Value>)> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Execute(_, sql, args) => Some((sql, args)),
                _ => None,
            })
            .collect()
    }

    fn record(&self, event: Event) {
        self.events.lock().unwrap().push(event);
    }
}

pub fn driver_error(message: &str) -> Error {
    Error::Database(sqlx::Error::Protocol(message.to_string()))
}

pub struct StubConnector;

#[async_trait]
impl Connector for StubConnector {
    async fn connect(&self) -> Result<Box<dyn Connection>> {
        let script = SCRIPT
            .try_with(Arc::clone)
            .map_err(|_| driver_error("no script for this task"))?;
        let id = script.connections.fetch_add(1, Ordering::SeqCst) + 1;
        script.record(Event::Connect(id));
        Ok(Box::new(StubConnection { id, script }))
    }

    fn placeholder(&self) -> Placeholder {
        Placeholder::Token("%s")
    }
}

struct StubConnection {
    id: usize,
    script: Arc<Script>,
}

#[async_trait]
impl Connection for StubConnection {
    async fn execute(&mut self, sql: &str, args: &[Value]) -> Result<ResultSet> {
        self.script
            .record(Event::Execute(self.id, sql.to_string(), args.to_vec()));
        let next = self.script.results.lock().unwrap().pop_front();
        next.unwrap_or_else(|| Ok(ResultSet::default()))
    }

    async fn commit(&mut self) -> Result<()> {
        self.script.record(Event::Commit(self.id));
        if self.script.fail_commit.load(Ordering::SeqCst) {
            return Err(driver_error("commit failed"));
        }
        Ok(())
    }

    async fn rollback(&mut self) -> Result<()> {
        self.script.record(Event::Rollback(self.id));
        if self.script.fail_rollback.load(Ordering::SeqCst) {
            return Err(driver_error("rollback failed"));
        }
        Ok(())
    }

    async fn close(self: Box<Self>) -> Result<()> {
        self.script.record(Event::Close(self.id));
        Ok(())
    }
}

pub fn init_logs() {
    let mut logger = env_logger::builder();
    logger
        .is_test(true)
        .format_file(true)
        .format_line_number(true);
    if env::var("RUST_LOG").is_err() {
        logger.filter_level(LevelFilter::Warn);
    }
    let _ = logger.try_init();
}

/// Installs the stub engine once per test binary.
pub fn install() {
    static INSTALL: Once = Once::new();
    INSTALL.call_once(|| {
        init_logs();
        init_engine(Engine::new(StubConnector)).expect("engine installed twice");
    });
}

/// Runs `fut` with `script` as the current task's driver script.
pub async fn run<F: Future>(script: Arc<Script>, fut: F) -> F::Output {
    install();
    SCRIPT.scope(script, fut).await
}

pub fn rows(columns: &[&str], rows: Vec<Vec<Value>>) -> ResultSet {
    ResultSet::rows(columns.iter().map(|c| c.to_string()).collect(), rows)
}
