use std::collections::VecDeque;
use std::sync::Arc;

use kbm_store::KnowledgeStore;
use kbm_types::EntityId;
use tracing::debug;

use crate::error::StreamResult;

enum Source {
    /// Page through a store search.
    Query {
        store: Arc<dyn KnowledgeStore>,
        query: String,
        page_size: usize,
    },
    /// A fixed list given up front.
    Fixed,
}

/// Lazy, forward-only sequence of candidate entity ids.
///
/// Query-backed streams run the query on the first call to `next`, paging
/// through every result from the requested offset before yielding any.
/// Merged candidates drop out of the live results, so the result set is
/// fixed before processing starts. A failing page fetch is returned to the
/// caller once; afterwards the stream is finished. Streams cannot be
/// rewound.
pub struct CandidateStream {
    source: Source,
    buffer: VecDeque<EntityId>,
    /// Offset of the next page to request from the store.
    cursor: u64,
    /// Offset of the next id to be yielded.
    position: u64,
    exhausted: bool,
}

impl CandidateStream {
    /// Stream the results of `query`, skipping the first `offset` matches.
    pub fn from_query(
        store: Arc<dyn KnowledgeStore>,
        query: impl Into<String>,
        offset: u64,
        page_size: usize,
    ) -> Self {
        Self {
            source: Source::Query {
                store,
                query: query.into(),
                page_size: page_size.max(1),
            },
            buffer: VecDeque::new(),
            cursor: offset,
            position: offset,
            exhausted: false,
        }
    }

    /// Stream a fixed list of ids, skipping the first `offset` of them.
    pub fn from_ids(ids: Vec<EntityId>, offset: u64) -> Self {
        let skip = usize::try_from(offset).unwrap_or(usize::MAX);
        Self {
            source: Source::Fixed,
            buffer: ids.into_iter().skip(skip).collect(),
            cursor: offset,
            position: offset,
            exhausted: true,
        }
    }

    /// Offset of the next id this stream will yield.
    pub fn offset(&self) -> u64 {
        self.position
    }

    /// The next candidate, or `None` at end of stream.
    pub async fn next(&mut self) -> StreamResult<Option<EntityId>> {
        if self.buffer.is_empty() && !self.exhausted {
            self.fill().await?;
        }
        let next = self.buffer.pop_front();
        if next.is_some() {
            self.position += 1;
        }
        Ok(next)
    }

    async fn fill(&mut self) -> StreamResult<()> {
        let Source::Query {
            store,
            query,
            page_size,
        } = &self.source
        else {
            self.exhausted = true;
            return Ok(());
        };
        self.exhausted = true;
        loop {
            let page = store.search(query, self.cursor, *page_size).await?;
            debug!(offset = self.cursor, count = page.len(), "fetched candidate page");
            let last = page.len() < *page_size;
            self.cursor += page.len() as u64;
            self.buffer.extend(page);
            if last {
                return Ok(());
            }
        }
    }
}
