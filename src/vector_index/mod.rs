
use arrow::array::{
    Array, FixedSizeListArray, Float32Array, RecordBatchIterator, StringArray, UInt32Array,
};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use futures::TryStreamExt;
use lancedb::{
    Connection,
    database::CreateTableMode,
    query::{ExecutableQuery, QueryBase},
};
use std::sync::Arc;
use tokio::sync::{RwLock, RwLockWriteGuard};
use tracing::{debug, info, warn};

use crate::chunking::TextChunk;
use crate::config::Config;
use crate::providers::EmbeddingModel;
use crate::{AssistantError, Result};

const TABLE_NAME: &str = "chunks";

/// Number of chunks returned when the caller does not say otherwise
pub const DEFAULT_TOP_K: usize = 4;

/// A chunk returned by similarity search, nearest first
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievedChunk {
    pub content: String,
    pub document: String,
    pub chunk_index: u32,
    /// L2 distance to the query vector
    pub distance: f32,
}

/// On-disk LanceDB index of embedded chunks
///
/// At most one table is live. Writers (`build`, `append`, `clear`) hold the
/// write half of `guard` from before embedding until the table is written.
/// The lock is fair, so a query that arrives during a write waits for it and
/// then sees only the new index.
pub struct VectorIndex {
    connection: Connection,
    table_name: String,
    embedder: Arc<dyn EmbeddingModel>,
    guard: RwLock<()>,
}

impl VectorIndex {
    /// Connect to `<base_dir>/vectors`, creating the directory if needed
    #[inline]
    pub async fn open(config: &Config, embedder: Arc<dyn EmbeddingModel>) -> Result<Self> {
        let db_path = config.vector_database_path();
        debug!("Opening LanceDB at path: {}", db_path.display());

        std::fs::create_dir_all(&db_path).map_err(|e| {
            AssistantError::Database(format!("Failed to create vector database directory: {}", e))
        })?;

        let uri = db_path.to_string_lossy().into_owned();
        let connection = lancedb::connect(&uri)
            .execute()
            .await
            .map_err(|e| AssistantError::Database(format!("Failed to connect to LanceDB: {}", e)))?;

        Ok(Self {
            connection,
            table_name: TABLE_NAME.to_string(),
            embedder,
            guard: RwLock::new(()),
        })
    }

    /// Take exclusive write access to the index
    ///
    /// Queries issued while the writer is alive wait until it is dropped, so
    /// a caller can hold it across a whole upload.
    #[inline]
    pub async fn writer(&self) -> IndexWriter<'_> {
        IndexWriter {
            index: self,
            _guard: self.guard.write().await,
        }
    }

    /// Embed `chunks` and replace the whole index with them
    #[inline]
    pub async fn build(&self, chunks: &[TextChunk], document: &str) -> Result<usize> {
        self.writer().await.build(chunks, document).await
    }

    /// Embed `chunks` and add them to the existing index
    #[inline]
    pub async fn append(&self, chunks: &[TextChunk], document: &str) -> Result<usize> {
        self.writer().await.append(chunks, document).await
    }

    /// Return the `k` chunks nearest to `text`
    #[inline]
    pub async fn query(&self, text: &str, k: usize) -> Result<Vec<RetrievedChunk>> {
        let _reader = self.guard.read().await;

        if !self.table_exists().await? {
            return Err(AssistantError::IndexNotFound);
        }

        let query_vector = self.embedder.embed_query(text).await?;
        debug!("Searching for {} nearest chunks", k);

        let table = self.open_table().await?;
        let mut results = table
            .vector_search(query_vector.as_slice())
            .map_err(|e| AssistantError::Database(format!("Failed to create vector search: {}", e)))?
            .column("vector")
            .limit(k.max(1))
            .execute()
            .await
            .map_err(|e| AssistantError::Database(format!("Failed to execute search: {}", e)))?;

        let mut retrieved = Vec::new();
        while let Some(batch) = results
            .try_next()
            .await
            .map_err(|e| AssistantError::Database(format!("Failed to read result stream: {}", e)))?
        {
            retrieved.extend(parse_search_batch(&batch)?);
        }

        retrieved.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        debug!("Retrieved {} chunks", retrieved.len());
        Ok(retrieved)
    }

    /// Number of indexed chunks, zero when no index exists
    #[inline]
    pub async fn count(&self) -> Result<usize> {
        let _reader = self.guard.read().await;

        if !self.table_exists().await? {
            return Ok(0);
        }

        self.open_table()
            .await?
            .count_rows(None)
            .await
            .map_err(|e| AssistantError::Database(format!("Failed to count rows: {}", e)))
    }

    #[inline]
    pub async fn exists(&self) -> Result<bool> {
        let _reader = self.guard.read().await;
        self.table_exists().await
    }

    /// Drop the index
    #[inline]
    pub async fn clear(&self) -> Result<()> {
        self.writer().await.clear().await
    }

    async fn embed_chunks(&self, chunks: &[TextChunk], document: &str) -> Result<RecordBatch> {
        if chunks.is_empty() {
            return Err(AssistantError::Database(
                "Cannot index an empty set of chunks".to_string(),
            ));
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
        let vectors = self.embedder.embed(&texts).await?;

        if vectors.len() != chunks.len() {
            return Err(AssistantError::EmbeddingService(format!(
                "Expected {} embeddings, got {}",
                chunks.len(),
                vectors.len()
            )));
        }

        create_record_batch(chunks, &vectors, document)
    }

    async fn table_exists(&self) -> Result<bool> {
        let table_names = self
            .connection
            .table_names()
            .execute()
            .await
            .map_err(|e| AssistantError::Database(format!("Failed to list tables: {}", e)))?;

        Ok(table_names.contains(&self.table_name))
    }

    async fn open_table(&self) -> Result<lancedb::Table> {
        self.connection
            .open_table(&self.table_name)
            .execute()
            .await
            .map_err(|e| AssistantError::Database(format!("Failed to open table: {}", e)))
    }

    async fn create_table(&self, batch: RecordBatch, mode: CreateTableMode) -> Result<()> {
        let schema = batch.schema();
        let reader = RecordBatchIterator::new(std::iter::once(Ok(batch)), schema);

        self.connection
            .create_table(&self.table_name, reader)
            .mode(mode)
            .execute()
            .await
            .map_err(|e| AssistantError::Database(format!("Failed to create table: {}", e)))?;

        Ok(())
    }

    async fn existing_dimension(&self) -> Result<usize> {
        let schema = self
            .open_table()
            .await?
            .schema()
            .await
            .map_err(|e| AssistantError::Database(format!("Failed to get table schema: {}", e)))?;

        schema
            .field_with_name("vector")
            .ok()
            .and_then(|field| match field.data_type() {
                DataType::FixedSizeList(_, size) => usize::try_from(*size).ok(),
                _ => None,
            })
            .ok_or_else(|| {
                AssistantError::Database(
                    "Could not find vector column or determine dimension".to_string(),
                )
            })
    }

    async fn drop_table_if_exists(&self) -> Result<()> {
        if self.table_exists().await? {
            info!("Dropping existing chunks table");
            self.connection
                .drop_table(&self.table_name)
                .await
                .map_err(|e| AssistantError::Database(format!("Failed to drop table: {}", e)))?;
        }

        Ok(())
    }
}

/// Exclusive write access to a [`VectorIndex`], released on drop
pub struct IndexWriter<'a> {
    index: &'a VectorIndex,
    _guard: RwLockWriteGuard<'a, ()>,
}

impl IndexWriter<'_> {
    /// Embed `chunks` and replace the whole index with them
    ///
    /// The old table is overwritten in one step once embedding succeeds, so
    /// a failure leaves the previous index intact.
    #[inline]
    pub async fn build(&self, chunks: &[TextChunk], document: &str) -> Result<usize> {
        let batch = self.index.embed_chunks(chunks, document).await?;
        self.index
            .create_table(batch, CreateTableMode::Overwrite)
            .await?;

        info!(
            "Built vector index with {} chunks from {}",
            chunks.len(),
            document
        );
        Ok(chunks.len())
    }

    /// Embed `chunks` and add them to the existing index
    ///
    /// Creates the index when there is none. An index of another vector
    /// dimension was built by a different embedding model and is replaced.
    #[inline]
    pub async fn append(&self, chunks: &[TextChunk], document: &str) -> Result<usize> {
        let batch = self.index.embed_chunks(chunks, document).await?;
        let dimension = vector_dimension_of(&batch)?;

        if !self.index.table_exists().await? {
            self.index
                .create_table(batch, CreateTableMode::Create)
                .await?;
        } else if self.index.existing_dimension().await? == dimension {
            let table = self.index.open_table().await?;
            let schema = batch.schema();
            let reader = RecordBatchIterator::new(std::iter::once(Ok(batch)), schema);
            table.add(reader).execute().await.map_err(|e| {
                AssistantError::Database(format!("Failed to insert chunks: {}", e))
            })?;
        } else {
            warn!(
                "Existing index has a different vector dimension than {}, replacing it",
                dimension
            );
            self.index
                .create_table(batch, CreateTableMode::Overwrite)
                .await?;
        }

        info!(
            "Appended {} chunks from {} to the vector index",
            chunks.len(),
            document
        );
        Ok(chunks.len())
    }

    #[inline]
    pub async fn clear(&self) -> Result<()> {
        self.index.drop_table_if_exists().await
    }
}

fn create_schema(vector_dim: i32) -> Arc<Schema> {
    Arc::new(Schema::new(vec![
        Field::new("id", DataType::Utf8, false),
        Field::new(
            "vector",
            DataType::FixedSizeList(
                Arc::new(Field::new("item", DataType::Float32, true)),
                vector_dim,
            ),
            false,
        ),
        Field::new("content", DataType::Utf8, false),
        Field::new("document", DataType::Utf8, false),
        Field::new("chunk_index", DataType::UInt32, false),
        Field::new("token_count", DataType::UInt32, false),
        Field::new("created_at", DataType::Utf8, false),
    ]))
}

fn create_record_batch(
    chunks: &[TextChunk],
    vectors: &[Vec<f32>],
    document: &str,
) -> Result<RecordBatch> {
    let vector_dim = vectors.first().map_or(0, Vec::len);
    if vector_dim == 0 || vectors.iter().any(|v| v.len() != vector_dim) {
        return Err(AssistantError::EmbeddingService(
            "Embeddings must share a non-zero dimension".to_string(),
        ));
    }
    let list_size = i32::try_from(vector_dim).map_err(|_| {
        AssistantError::EmbeddingService(format!("Vector dimension {} too large", vector_dim))
    })?;

    let created_at = chrono::Utc::now().to_rfc3339();
    let len = chunks.len();

    let ids: Vec<String> = (0..len).map(|_| uuid::Uuid::new_v4().to_string()).collect();
    let contents: Vec<&str> = chunks.iter().map(|c| c.content.as_str()).collect();
    let chunk_indices: Vec<u32> = chunks
        .iter()
        .map(|c| u32::try_from(c.chunk_index).unwrap_or(u32::MAX))
        .collect();
    let token_counts: Vec<u32> = chunks
        .iter()
        .map(|c| u32::try_from(c.token_count).unwrap_or(u32::MAX))
        .collect();

    let flat_values: Vec<f32> = vectors.iter().flatten().copied().collect();
    let field = Arc::new(Field::new("item", DataType::Float32, true));
    let vector_array = FixedSizeListArray::try_new(
        field,
        list_size,
        Arc::new(Float32Array::from(flat_values)),
        None,
    )
    .map_err(|e| AssistantError::Database(format!("Failed to create vector array: {}", e)))?;

    let arrays: Vec<Arc<dyn Array>> = vec![
        Arc::new(StringArray::from(ids)),
        Arc::new(vector_array),
        Arc::new(StringArray::from(contents)),
        Arc::new(StringArray::from(vec![document; len])),
        Arc::new(UInt32Array::from(chunk_indices)),
        Arc::new(UInt32Array::from(token_counts)),
        Arc::new(StringArray::from(vec![created_at.as_str(); len])),
    ];

    RecordBatch::try_new(create_schema(list_size), arrays)
        .map_err(|e| AssistantError::Database(format!("Failed to create record batch: {}", e)))
}

fn vector_dimension_of(batch: &RecordBatch) -> Result<usize> {
    batch
        .column_by_name("vector")
        .and_then(|column| column.as_any().downcast_ref::<FixedSizeListArray>())
        .and_then(|vectors| usize::try_from(vectors.value_length()).ok())
        .ok_or_else(|| AssistantError::Database("Missing vector column".to_string()))
}

fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray> {
    batch
        .column_by_name(name)
        .ok_or_else(|| AssistantError::Database(format!("Missing {} column", name)))?
        .as_any()
        .downcast_ref::<StringArray>()
        .ok_or_else(|| AssistantError::Database(format!("Invalid {} column type", name)))
}

fn parse_search_batch(batch: &RecordBatch) -> Result<Vec<RetrievedChunk>> {
    let contents = string_column(batch, "content")?;
    let documents = string_column(batch, "document")?;

    let chunk_indices = batch
        .column_by_name("chunk_index")
        .ok_or_else(|| AssistantError::Database("Missing chunk_index column".to_string()))?
        .as_any()
        .downcast_ref::<UInt32Array>()
        .ok_or_else(|| AssistantError::Database("Invalid chunk_index column type".to_string()))?;

    let distances = batch
        .column_by_name("_distance")
        .and_then(|col| col.as_any().downcast_ref::<Float32Array>());

    Ok((0..batch.num_rows())
        .map(|row| RetrievedChunk {
            content: contents.value(row).to_string(),
            document: documents.value(row).to_string(),
            chunk_index: chunk_indices.value(row),
            distance: distances.map_or(0.0, |d| if d.is_null(row) { 0.0 } else { d.value(row) }),
        })
        .collect())
}
