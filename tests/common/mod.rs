#![allow(dead_code)]

use std::{
    collections::{HashMap, VecDeque},
    sync::{
        Mutex,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
};

use anyhow::{Error, Result, anyhow};
use async_trait::async_trait;
use chrono::Utc;
use dispatch_service::{
    clients::{
        audit_store::AuditStore,
        blob::BlobStore,
        directory::UserDirectory,
        otp_store::OtpStore,
        policy::PolicyDecisionPoint,
        queue::{Queue, QueueMessage},
        token::TokenValidator,
        topic::Topic,
    },
    models::{
        audit::AuditEvent,
        channel::Channel,
        otp::{OtpRecord, OtpStatus},
        policy::{Decision, ResourceRef, TokenClaims},
    },
};
use tokio::time::Duration;

/// Queue with at-least-once semantics: received messages move in flight and
/// stay there until deleted; `requeue_in_flight` simulates redelivery after
/// a consumer that never acknowledged.
#[derive(Default)]
pub struct MemoryQueue {
    visible: Mutex<VecDeque<(u64, String)>>,
    in_flight: Mutex<HashMap<u64, String>>,
    next_id: AtomicU64,
    fail_sends: AtomicBool,
}

impl MemoryQueue {
    pub fn fail_sends(&self) {
        self.fail_sends.store(true, Ordering::SeqCst);
    }

    pub fn visible_len(&self) -> usize {
        self.visible.lock().unwrap().len()
    }

    pub fn in_flight_len(&self) -> usize {
        self.in_flight.lock().unwrap().len()
    }

    /// Total undeleted messages, visible or not.
    pub fn remaining(&self) -> usize {
        self.visible_len() + self.in_flight_len()
    }

    pub fn bodies(&self) -> Vec<String> {
        self.visible
            .lock()
            .unwrap()
            .iter()
            .map(|(_, body)| body.clone())
            .collect()
    }

    pub fn requeue_in_flight(&self) {
        let mut in_flight = self.in_flight.lock().unwrap();
        let mut visible = self.visible.lock().unwrap();

        for (id, body) in in_flight.drain() {
            visible.push_back((id, body));
        }
    }
}

#[async_trait]
impl Queue for MemoryQueue {
    async fn send(&self, body: &str) -> Result<(), Error> {
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(anyhow!("Queue unavailable"));
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.visible
            .lock()
            .unwrap()
            .push_back((id, body.to_string()));
        Ok(())
    }

    async fn receive(
        &self,
        max_messages: usize,
        _wait: Duration,
    ) -> Result<Vec<QueueMessage>, Error> {
        let mut visible = self.visible.lock().unwrap();
        let mut in_flight = self.in_flight.lock().unwrap();
        let mut messages = Vec::new();

        while messages.len() < max_messages {
            let Some((id, body)) = visible.pop_front() else {
                break;
            };

            messages.push(QueueMessage {
                receipt: id.to_string(),
                body: body.clone(),
            });
            in_flight.insert(id, body);
        }

        Ok(messages)
    }

    async fn delete(&self, receipt: &str) -> Result<(), Error> {
        let id: u64 = receipt.parse().map_err(|_| anyhow!("Bad receipt"))?;

        self.in_flight
            .lock()
            .unwrap()
            .remove(&id)
            .ok_or_else(|| anyhow!("Unknown receipt {}", receipt))?;

        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryTopic {
    published: Mutex<Vec<(Option<String>, String)>>,
    fail_publishes: AtomicBool,
}

impl MemoryTopic {
    pub fn fail_publishes(&self) {
        self.fail_publishes.store(true, Ordering::SeqCst);
    }

    pub fn published(&self) -> Vec<(Option<String>, String)> {
        self.published.lock().unwrap().clone()
    }
}

#[async_trait]
impl Topic for MemoryTopic {
    async fn publish(&self, subject: Option<&str>, body: &str) -> Result<(), Error> {
        if self.fail_publishes.load(Ordering::SeqCst) {
            return Err(anyhow!("Topic unavailable"));
        }

        self.published
            .lock()
            .unwrap()
            .push((subject.map(str::to_string), body.to_string()));
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryBlobStore {
    objects: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryBlobStore {
    pub fn put(&self, key: &str, bytes: &[u8]) {
        self.objects
            .lock()
            .unwrap()
            .insert(key.to_string(), bytes.to_vec());
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn fetch(&self, key: &str) -> Result<Vec<u8>, Error> {
        self.objects
            .lock()
            .unwrap()
            .get(key)
            .cloned()
            .ok_or_else(|| anyhow!("No such blob: {}", key))
    }
}

#[derive(Default)]
pub struct MemoryDirectory {
    contacts: Mutex<HashMap<(String, Channel), String>>,
    failing_users: Mutex<Vec<String>>,
}

impl MemoryDirectory {
    pub fn put(&self, user_id: &str, channel: Channel, address: &str) {
        self.contacts
            .lock()
            .unwrap()
            .insert((user_id.to_string(), channel), address.to_string());
    }

    /// Make lookups for this user fail with a backend error.
    pub fn fail_for(&self, user_id: &str) {
        self.failing_users.lock().unwrap().push(user_id.to_string());
    }
}

#[async_trait]
impl UserDirectory for MemoryDirectory {
    async fn contact(&self, user_id: &str, channel: Channel) -> Result<Option<String>, Error> {
        if self
            .failing_users
            .lock()
            .unwrap()
            .iter()
            .any(|failing| failing == user_id)
        {
            return Err(anyhow!("Directory backend unavailable"));
        }

        Ok(self
            .contacts
            .lock()
            .unwrap()
            .get(&(user_id.to_string(), channel))
            .cloned())
    }
}

#[derive(Default)]
pub struct MemoryOtpStore {
    records: Mutex<Vec<OtpRecord>>,
    fail_inserts: AtomicBool,
}

impl MemoryOtpStore {
    pub fn fail_inserts(&self) {
        self.fail_inserts.store(true, Ordering::SeqCst);
    }

    pub fn records(&self) -> Vec<OtpRecord> {
        self.records.lock().unwrap().clone()
    }
}

#[async_trait]
impl OtpStore for MemoryOtpStore {
    async fn insert(&self, user_id: &str, otp: &str, transaction_type: &str) -> Result<(), Error> {
        if self.fail_inserts.load(Ordering::SeqCst) {
            return Err(anyhow!("OTP store unavailable"));
        }

        let mut records = self.records.lock().unwrap();
        let id = records.len() as i64 + 1;

        records.push(OtpRecord {
            id,
            otp: otp.to_string(),
            user_id: user_id.to_string(),
            transaction_type: transaction_type.to_string(),
            status: OtpStatus::Pending,
            created_at: Utc::now(),
        });

        Ok(())
    }

    async fn find_active(
        &self,
        user_id: &str,
        otp: &str,
        transaction_type: &str,
    ) -> Result<Option<OtpRecord>, Error> {
        Ok(self
            .records
            .lock()
            .unwrap()
            .iter()
            .find(|record| {
                record.user_id == user_id
                    && record.otp == otp
                    && record.transaction_type == transaction_type
                    && record.status == OtpStatus::Pending
            })
            .cloned())
    }

    async fn mark_used(&self, id: i64) -> Result<(), Error> {
        for record in self.records.lock().unwrap().iter_mut() {
            if record.id == id {
                record.status = OtpStatus::Used;
            }
        }

        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryAuditStore {
    events: Mutex<Vec<AuditEvent>>,
    fail_after: Mutex<Option<usize>>,
}

impl MemoryAuditStore {
    /// Accept this many events, then fail every append.
    pub fn fail_after(&self, accepted: usize) {
        *self.fail_after.lock().unwrap() = Some(accepted);
    }

    pub fn events(&self) -> Vec<AuditEvent> {
        self.events.lock().unwrap().clone()
    }
}

#[async_trait]
impl AuditStore for MemoryAuditStore {
    async fn append(&self, event: &AuditEvent) -> Result<(), Error> {
        let mut events = self.events.lock().unwrap();

        if let Some(accepted) = *self.fail_after.lock().unwrap() {
            if events.len() >= accepted {
                return Err(anyhow!("Audit store unavailable"));
            }
        }

        events.push(event.clone());
        Ok(())
    }
}

/// Validator accepting a fixed set of tokens.
#[derive(Default)]
pub struct StaticTokenValidator {
    tokens: Mutex<HashMap<String, TokenClaims>>,
}

impl StaticTokenValidator {
    pub fn accept(&self, token: &str, claims: TokenClaims) {
        self.tokens
            .lock()
            .unwrap()
            .insert(token.to_string(), claims);
    }
}

#[async_trait]
impl TokenValidator for StaticTokenValidator {
    async fn validate(&self, token: &str) -> Result<TokenClaims, Error> {
        self.tokens
            .lock()
            .unwrap()
            .get(token)
            .cloned()
            .ok_or_else(|| anyhow!("Token validation failed: unknown token"))
    }
}

/// Policy decision point returning canned decisions and recording calls.
pub struct StaticPolicy {
    single: Decision,
    batch: Vec<Decision>,
    pub calls: AtomicU64,
}

impl StaticPolicy {
    pub fn allowing() -> Self {
        Self {
            single: Decision::Allow,
            batch: vec![Decision::Allow],
            calls: AtomicU64::new(0),
        }
    }

    pub fn denying() -> Self {
        Self {
            single: Decision::Deny,
            batch: vec![Decision::Deny],
            calls: AtomicU64::new(0),
        }
    }

    pub fn with_batch(mut self, batch: Vec<Decision>) -> Self {
        self.batch = batch;
        self
    }

    pub fn call_count(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PolicyDecisionPoint for StaticPolicy {
    async fn is_authorized(
        &self,
        _principal: &str,
        _action: &str,
        _resource: &ResourceRef,
    ) -> Result<Decision, Error> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.single)
    }

    async fn batch_is_authorized(
        &self,
        _principal: &str,
        _action: &str,
        resources: &[ResourceRef],
    ) -> Result<Vec<Decision>, Error> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let mut decisions = self.batch.clone();
        decisions.resize(resources.len(), Decision::Deny);
        Ok(decisions)
    }
}

pub fn claims_for(sub: &str) -> TokenClaims {
    TokenClaims {
        sub: sub.to_string(),
        email: Some(format!("{}@example.com", sub)),
        org_id: Some("org-1".to_string()),
        root: None,
        exp: 4_102_444_800,
        iat: None,
    }
}
