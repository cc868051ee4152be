// SQLGate - Connection Pool
// Copyright (C) 2025 Akaere Networks
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Bounded SQLite connection pool
//!
//! One pool per namespace. When every connection is busy, callers queue on
//! a condvar with a deadline instead of opening more connections; a
//! misbehaving namespace saturates its own pool, not the database. Runs on
//! blocking threads only; the async side reaches it through
//! `spawn_blocking`.

use rusqlite::Connection;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

/// Why an acquisition came back empty
#[derive(Debug)]
pub enum AcquireError {
    /// The deadline passed while every connection stayed busy
    Timeout,
    /// The caller's cancel check fired
    Cancelled,
    /// Opening a new connection failed
    Open(anyhow::Error),
}

struct PoolState {
    idle: Vec<Connection>,
}

/// A bounded pool of SQLite connections for one namespace
pub struct Pool {
    max: usize,
    factory: Box<dyn Fn() -> anyhow::Result<Connection> + Send + Sync>,
    state: Mutex<PoolState>,
    available: Condvar,
    open: AtomicUsize,
}

/// A connection that returns to its pool on drop
pub struct PooledConnection {
    pool: Arc<Pool>,
    conn: Option<Connection>,
}

impl std::fmt::Debug for Pool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pool")
            .field("max", &self.max)
            .field("open", &self.open_connections())
            .field("idle", &self.idle_count())
            .finish()
    }
}

impl Pool {
    pub fn new<F>(max: usize, factory: F) -> Arc<Self>
    where
        F: Fn() -> anyhow::Result<Connection> + Send + Sync + 'static,
    {
        Arc::new(Self {
            max: max.max(1),
            factory: Box::new(factory),
            state: Mutex::new(PoolState { idle: Vec::new() }),
            available: Condvar::new(),
            open: AtomicUsize::new(0),
        })
    }

    /// Acquire a connection, waiting up to `timeout` and polling
    /// `cancel_check` while queued.
    pub fn acquire<F>(
        self: &Arc<Self>,
        timeout: Duration,
        mut cancel_check: F,
    ) -> Result<PooledConnection, AcquireError>
    where
        F: FnMut() -> bool,
    {
        let deadline = Instant::now() + timeout;
        let poll = Duration::from_millis(5);
        loop {
            if cancel_check() {
                return Err(AcquireError::Cancelled);
            }

            let mut state = self.state.lock().unwrap();
            if let Some(conn) = state.idle.pop() {
                return Ok(PooledConnection {
                    pool: Arc::clone(self),
                    conn: Some(conn),
                });
            }

            if self.open.load(Ordering::SeqCst) < self.max {
                self.open.fetch_add(1, Ordering::SeqCst);
                drop(state);
                match (self.factory)() {
                    Ok(conn) => {
                        return Ok(PooledConnection {
                            pool: Arc::clone(self),
                            conn: Some(conn),
                        });
                    }
                    Err(error) => {
                        self.open.fetch_sub(1, Ordering::SeqCst);
                        self.available.notify_one();
                        return Err(AcquireError::Open(error));
                    }
                }
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(AcquireError::Timeout);
            }
            let remaining = deadline - now;
            let wait = if remaining > poll { poll } else { remaining };
            let (guard, _) = self.available.wait_timeout(state, wait).unwrap();
            drop(guard);
            if Instant::now() >= deadline {
                return Err(AcquireError::Timeout);
            }
        }
    }

    /// Connections currently in existence (idle + handed out)
    pub fn open_connections(&self) -> usize {
        self.open.load(Ordering::SeqCst)
    }

    pub fn idle_count(&self) -> usize {
        self.state.lock().unwrap().idle.len()
    }

    fn release(&self, conn: Connection) {
        let mut state = self.state.lock().unwrap();
        state.idle.push(conn);
        self.available.notify_one();
    }

    fn forget(&self) {
        self.open.fetch_sub(1, Ordering::SeqCst);
        self.available.notify_one();
    }
}

impl PooledConnection {
    /// Drop this connection instead of returning it to the pool. Used when
    /// a statement was interrupted and the connection cannot be proven
    /// idle; the pool will open a replacement on demand.
    pub fn discard(mut self) {
        if self.conn.take().is_some() {
            self.pool.forget();
        }
    }
}

impl Deref for PooledConnection {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        self.conn.as_ref().expect("pooled connection already released")
    }
}

impl DerefMut for PooledConnection {
    fn deref_mut(&mut self) -> &mut Connection {
        self.conn.as_mut().expect("pooled connection already released")
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            self.pool.release(conn);
        }
    }
}
