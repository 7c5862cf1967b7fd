// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! `create`, `update` and `delete`.

use serde_json::Value;
use tally_core::{Collection, Entity, Identity, Mutation, WriteOutcome};

use super::{block_on, open, parse_collection, Context};
use crate::error::{Error, Result};

pub fn create(collection: &str, json: &str) -> Result<()> {
    let collection = parse_collection(collection)?;
    let mutation = Mutation::Create(parse_entity(collection, json)?);
    submit(mutation)
}

pub fn update(collection: &str, id: &str, json: &str) -> Result<()> {
    let collection = parse_collection(collection)?;
    let entity = parse_entity(collection, json)?;
    let ctx = open()?;
    let target = resolve(&ctx, collection, id)?;
    submit_with(&ctx, Mutation::Update { target, entity })
}

pub fn delete(collection: &str, id: &str) -> Result<()> {
    let collection = parse_collection(collection)?;
    let ctx = open()?;
    let target = resolve(&ctx, collection, id)?;
    submit_with(&ctx, Mutation::Delete { collection, target })
}

fn submit(mutation: Mutation) -> Result<()> {
    let ctx = open()?;
    submit_with(&ctx, mutation)
}

fn submit_with(ctx: &Context, mutation: Mutation) -> Result<()> {
    let outcome = block_on(apply(ctx, mutation.clone()))??;
    println!("{}", describe(&mutation, &outcome));
    Ok(())
}

/// Probe, then hand the mutation to the engine.
pub(crate) async fn apply(ctx: &Context, mutation: Mutation) -> Result<WriteOutcome> {
    ctx.refresh_connectivity().await;
    Ok(ctx.engine.write(mutation).await?)
}

/// Parse `--json` into the collection's entity.
pub(crate) fn parse_entity(collection: Collection, json: &str) -> Result<Entity> {
    let value: Value = serde_json::from_str(json).map_err(|e| Error::InvalidJson(e.to_string()))?;
    if !value.is_object() {
        return Err(Error::InvalidJson("expected a JSON object".to_string()));
    }
    Entity::from_body(collection, value).map_err(|e| match e {
        tally_core::Error::Json(e) => Error::InvalidJson(e.to_string()),
        other => other.into(),
    })
}

/// Recover the identity kind of an id from the cache.
pub(crate) fn resolve(ctx: &Context, collection: Collection, id: &str) -> Result<Identity> {
    ctx.engine
        .store()
        .resolve(collection, id)?
        .map(|record| record.identity)
        .ok_or_else(|| Error::RecordNotFound {
            collection: collection.to_string(),
            id: id.to_string(),
        })
}

pub(crate) fn describe(mutation: &Mutation, outcome: &WriteOutcome) -> String {
    let collection = mutation.collection();
    let target = match (mutation, outcome.record()) {
        (_, Some(record)) => record.identity.as_str().to_string(),
        (Mutation::Update { target, .. } | Mutation::Delete { target, .. }, None) => {
            target.as_str().to_string()
        }
        (Mutation::Create(_), None) => "?".to_string(),
    };

    match outcome {
        WriteOutcome::Reconciled { .. } => {
            let verb = match mutation {
                Mutation::Create(_) => "Created",
                Mutation::Update { .. } => "Updated",
                Mutation::Delete { .. } => "Deleted",
            };
            format!("{} {}/{}", verb, collection, target)
        }
        WriteOutcome::Queued { sequence, .. } => format!(
            "Queued #{}: {} {}/{} (will sync when online)",
            sequence,
            mutation.kind(),
            collection,
            target
        ),
        WriteOutcome::Collapsed => format!(
            "Deleted {}/{} (never synced, queued create cancelled)",
            collection, target
        ),
    }
}

#[cfg(test)]
#[path = "write_tests.rs"]
mod tests;
