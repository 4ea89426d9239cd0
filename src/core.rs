//! Console operations behind each command
//!
//! [`Console`] ties the API client to the two reusable helpers:
//! - listings go through the range fetcher in [`crate::pagination`]
//! - create, edit and delete go through the bulk runner in [`crate::bulk`]
//! - watch runs the poller in [`crate::watch`] on top of the range fetcher
//!
//! Rendering is left to the caller through [`Reporter`] and plain return
//! values.

use std::time::Duration;

use anyhow::{Context as _, Result};
use serde_json::{json, Map, Value};
use tracing::{debug, info};

use crate::{
    bulk::{BatchReport, BulkOptions, BulkRunner, InputSource, Reporter},
    config::Context,
    fields::{weak_decode_lenient, FieldSource, Prompt},
    http::ApiClient,
    models::{BulkModel, IdRecord, Resource},
    pagination::{fetch_range, RangeArgs},
    watch::{self, Watch},
};

/// Entry point for every console operation of one invocation
///
/// # Examples
///
/// ```no_run
/// use consolectl::config::{Context, Overrides};
/// use consolectl::core::Console;
/// use consolectl::models::Resource;
/// use consolectl::pagination::RangeArgs;
///
/// # async fn example() -> anyhow::Result<()> {
/// let ctx = Context::resolve(Overrides::default())?;
/// let console = Console::new(&ctx)?;
///
/// // items 11 through 20
/// let users = console
///     .list(Resource::Users, &RangeArgs::new(Some(11), Some(21), false))
///     .await?;
/// println!("{} users", users.len());
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Console {
    client: ApiClient,
    page_size: i64,
}

impl Console {
    pub fn new(ctx: &Context) -> Result<Self> {
        Ok(Self {
            client: ApiClient::new(ctx)?,
            page_size: ctx.page_size,
        })
    }

    /// Returns the items of `range`, in server order
    pub async fn list(&self, resource: Resource, range: &RangeArgs) -> Result<Vec<Value>> {
        let page_size = resource.page_size(self.page_size);
        info!("Listing {} ({} per page)", resource.path(), page_size);

        let client = &self.client;
        fetch_range(range, page_size, |request| client.list(resource, request)).await
    }

    pub async fn get(&self, resource: Resource, id: &str) -> Result<Value> {
        self.client
            .get(resource, id)
            .await
            .with_context(|| format!("fetching {} {}", resource.path(), id))
    }

    /// Creates one object per input record
    pub async fn create<M: BulkModel>(
        &self,
        source: &InputSource,
        options: BulkOptions,
        flags: &dyn FieldSource,
        prompt: &mut dyn Prompt,
        reporter: &mut dyn Reporter<Value>,
    ) -> Result<BatchReport<Value>> {
        let runner = BulkRunner::new(M::fields(), M::setters(), options).identify_with(M::identify);
        let client = &self.client;

        runner
            .run(source, &M::default(), flags, prompt, reporter, |body: M| async move {
                debug!("Creating {} {:?}", M::RESOURCE.path(), body.identify());
                client.create(M::RESOURCE, &body).await
            })
            .await
    }

    /// Applies explicitly given flags to the current state of object `id`
    pub async fn edit<M: BulkModel>(
        &self,
        id: &str,
        flags: &dyn FieldSource,
        prompt: &mut dyn Prompt,
        reporter: &mut dyn Reporter<Value>,
    ) -> Result<BatchReport<Value>> {
        let current = self.get(M::RESOURCE, id).await?;
        let current = match current {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        // stored values are taken as they are; only the edited flags are validated
        let seed: M = weak_decode_lenient(&M::fields(), &M::default(), &current)
            .with_context(|| format!("decoding {} {}", M::RESOURCE.path(), id))?;

        let options = BulkOptions {
            multi: false,
            ..BulkOptions::default()
        };
        let runner = BulkRunner::new(M::fields(), M::setters(), options);
        let client = &self.client;

        runner
            .run(&InputSource::Flags, &seed, flags, prompt, reporter, |body: M| async move {
                client.update(M::RESOURCE, id, &body).await
            })
            .await
    }

    /// Deletes one object per input record
    pub async fn delete(
        &self,
        resource: Resource,
        source: &InputSource,
        options: BulkOptions,
        flags: &dyn FieldSource,
        prompt: &mut dyn Prompt,
        reporter: &mut dyn Reporter<Value>,
    ) -> Result<BatchReport<Value>> {
        let runner = BulkRunner::new(IdRecord::fields(), IdRecord::setters(), options)
            .identify_with(|r: &IdRecord| Some(r.id.clone()));
        let client = &self.client;

        runner
            .run(source, &IdRecord::default(), flags, prompt, reporter, |record: IdRecord| async move {
                client.delete(resource, &record.id).await?;
                Ok::<_, anyhow::Error>(json!({ "id": record.id, "deleted": true }))
            })
            .await
    }

    /// Starts polling `resource` for newly appearing objects
    pub fn watch(&self, resource: Resource, interval: Duration) -> Watch<Value> {
        let console = self.clone();
        watch::spawn(
            interval,
            watch::DEFAULT_CAPACITY,
            move || {
                let console = console.clone();
                async move { console.list(resource, &RangeArgs::all()).await }
            },
            item_key,
        )
    }
}

/// Identity of a listed object: its `id`, or the whole object if it has none
pub fn item_key(item: &Value) -> String {
    match item.get("id") {
        Some(Value::String(id)) => id.clone(),
        Some(id) => id.to_string(),
        None => item.to_string(),
    }
}
