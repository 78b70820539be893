use std::fmt::{Display, Formatter};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio::sync::oneshot;
use tracing::Instrument;

use crate::Identifier;
use crate::aggregate::Aggregate;
use crate::config::Settings;
use crate::error::{EmptyQuery, LookupError, ResolveError};
use crate::fetcher::RecordFetcher;
use crate::pipeline::{ResolutionTask, TaskOutcome};
use crate::progress::Tracker;
use crate::source::RecordSource;

/// What the user asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupKey {
    Id(Identifier),
    /// Exact spell name.
    Name(String),
}

impl FromStr for LookupKey {
    type Err = EmptyQuery;

    /// All-digit input is an id, anything else non-empty is a name.
    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let text = text.trim();
        if text.is_empty() {
            return Err(EmptyQuery);
        }

        if text.bytes().all(|b| b.is_ascii_digit())
            && let Ok(id) = text.parse()
        {
            return Ok(LookupKey::Id(id));
        }

        Ok(LookupKey::Name(text.to_string()))
    }
}

impl Display for LookupKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            LookupKey::Id(id) => write!(f, "{id}"),
            LookupKey::Name(name) => f.write_str(name),
        }
    }
}

/// Outcome of one query.
#[derive(Debug)]
pub enum QueryReport {
    /// No spell matched. Not an error.
    NoMatch { query: String },
    Resolved {
        query: String,
        /// Completed tasks in root order.
        outcomes: Vec<TaskOutcome>,
        aggregate: Aggregate,
    },
}

/// Resolves queries into model and texture files.
pub struct Resolver {
    fetcher: RecordFetcher,
    tick: Duration,
}

impl Resolver {
    pub fn new(source: Arc<dyn RecordSource>, settings: &Settings) -> Self {
        Self {
            fetcher: RecordFetcher::new(source, settings),
            tick: settings.tick,
        }
    }

    /// Resolver talking to wago.tools.
    #[cfg(feature = "http")]
    pub fn wago(settings: &Settings) -> Result<Self, LookupError> {
        let source = crate::source::wago::WagoSource::new(settings)?;
        Ok(Self::new(Arc::new(source), settings))
    }

    pub fn fetcher(&self) -> &RecordFetcher {
        &self.fetcher
    }

    /// Root spell ids for `key`, in the order the remote side lists them.
    pub async fn roots(&self, key: &LookupKey) -> Result<Vec<Identifier>, LookupError> {
        match key {
            LookupKey::Id(id) => Ok(vec![*id]),
            LookupKey::Name(name) => self.fetcher.spells_named(name).await,
        }
    }

    /// Runs every matching spell through the pipeline concurrently, with one
    /// progress slot each, and merges their files.
    pub async fn resolve(&self, query: &str) -> Result<QueryReport, ResolveError> {
        let query = query.trim().to_string();
        let Ok(key) = query.parse::<LookupKey>() else {
            return Ok(QueryReport::NoMatch { query });
        };

        let roots = self.roots(&key).await.map_err(ResolveError::Roots)?;
        if roots.is_empty() {
            tracing::info!(%key, "no matching spells");
            return Ok(QueryReport::NoMatch { query });
        }
        tracing::info!(%key, ?roots, "resolving");

        let (tracker, handles) = Tracker::new(&roots, self.tick);
        let (stop_tx, stop_rx) = oneshot::channel();

        let tasks = roots.iter().zip(handles).map(|(&root, mut handle)| {
            let span = tracker.span(handle.index());
            let fetcher = &self.fetcher;
            async move { ResolutionTask::new(fetcher, root).run(&mut handle).await }
                .instrument(span)
        });

        let work = async {
            let results = join_all(tasks).await;
            let _ = stop_tx.send(());
            results
        };

        let (results, ()) = tokio::join!(work, tracker.run(stop_rx));

        let outcomes = results
            .iter()
            .filter_map(|result| result.as_ref().ok())
            .cloned()
            .collect();
        let aggregate = Aggregate::collect(&query, results);

        Ok(QueryReport::Resolved {
            query,
            outcomes,
            aggregate,
        })
    }
}
