use crate::entities::product;
use crate::search::ProductIndex;
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tantivy::schema::Value;
use tantivy::{
    collector::TopDocs,
    directory::MmapDirectory,
    doc,
    query::{BooleanQuery, FuzzyTermQuery, Occur, Query, QueryParser},
    schema::{
        Field, IndexRecordOption, Schema, SchemaBuilder, TextFieldIndexing, TextOptions, STORED,
        STRING,
    },
    Index, IndexReader, IndexWriter, ReloadPolicy, TantivyDocument, Term,
};
use tracing::debug;
use uuid::Uuid;

/// Search behaviour knobs.
#[derive(Debug, Clone)]
pub struct SearchOptions {
    pub fuzzy_distance: Option<u8>,
    pub boost_title: bool,
}

impl Default for SearchOptions {
    fn default() -> Self {
        SearchOptions {
            fuzzy_distance: Some(1),
            boost_title: true,
        }
    }
}

#[derive(Clone)]
pub struct TantivyIndex {
    index: Index,
    reader: IndexReader,
    writer: Arc<Mutex<IndexWriter>>,
    id_field: Field,
    title_field: Field,
    body_field: Field,
    options: SearchOptions,
}

impl TantivyIndex {
    pub fn in_ram() -> Result<Self> {
        Self::build(Index::create_in_ram(Self::create_schema()))
    }

    pub fn open_or_create(path: &Path) -> Result<Self> {
        std::fs::create_dir_all(path)?;
        let directory = MmapDirectory::open(path)?;
        Self::build(Index::open_or_create(directory, Self::create_schema())?)
    }

    pub fn with_options(mut self, options: SearchOptions) -> Self {
        self.options = options;
        self
    }

    fn build(index: Index) -> Result<Self> {
        let schema = index.schema();
        let field = |name: &str| {
            schema
                .get_field(name)
                .map_err(|e| anyhow!("search schema is missing {name}: {e}"))
        };
        let id_field = field("id")?;
        let title_field = field("title")?;
        let body_field = field("body")?;

        let writer = index.writer(50_000_000)?;
        let reader = index
            .reader_builder()
            .reload_policy(ReloadPolicy::Manual)
            .try_into()?;

        Ok(Self {
            index,
            reader,
            writer: Arc::new(Mutex::new(writer)),
            id_field,
            title_field,
            body_field,
            options: SearchOptions::default(),
        })
    }

    fn create_schema() -> Schema {
        let mut builder = SchemaBuilder::new();

        let text_options = TextOptions::default().set_stored().set_indexing_options(
            TextFieldIndexing::default()
                .set_tokenizer("en_stem")
                .set_index_option(IndexRecordOption::WithFreqsAndPositions),
        );

        builder.add_text_field("id", STRING | STORED);
        builder.add_text_field("title", text_options.clone());
        builder.add_text_field("body", text_options);
        builder.build()
    }

    fn id_term(&self, id: Uuid) -> Term {
        Term::from_field_text(self.id_field, &id.to_string())
    }

    fn commit(&self, writer: &mut IndexWriter) -> Result<()> {
        writer.commit()?;
        self.reader.reload()?;
        Ok(())
    }

    fn build_query(&self, query: &str) -> Box<dyn Query> {
        let mut parser =
            QueryParser::for_index(&self.index, vec![self.title_field, self.body_field]);
        if self.options.boost_title {
            parser.set_field_boost(self.title_field, 2.0);
        }

        let lowered = query.to_lowercase();
        let (parsed, errors) = parser.parse_query_lenient(&lowered);
        if !errors.is_empty() {
            debug!(query, ?errors, "lenient query parse");
        }

        let mut subqueries: Vec<(Occur, Box<dyn Query>)> = vec![(Occur::Should, parsed)];
        if let Some(distance) = self.options.fuzzy_distance {
            for term in lowered.split_whitespace().filter(|t| t.len() > 2) {
                for field in [self.title_field, self.body_field] {
                    subqueries.push((
                        Occur::Should,
                        Box::new(FuzzyTermQuery::new_prefix(
                            Term::from_field_text(field, term),
                            distance,
                            true,
                        )),
                    ));
                }
            }
        }
        Box::new(BooleanQuery::new(subqueries))
    }
}

#[async_trait]
impl ProductIndex for TantivyIndex {
    async fn index_product(&self, product: &product::Model) -> Result<()> {
        let body = format!(
            "{} {} {}",
            product.description,
            product.category.label(),
            product.tags.0.join(" ")
        );

        let mut writer = self
            .writer
            .lock()
            .map_err(|_| anyhow!("search writer lock poisoned"))?;
        writer.delete_term(self.id_term(product.id));
        writer.add_document(doc!(
            self.id_field => product.id.to_string(),
            self.title_field => product.title.clone(),
            self.body_field => body,
        ))?;
        self.commit(&mut writer)
    }

    async fn remove_product(&self, id: Uuid) -> Result<()> {
        let mut writer = self
            .writer
            .lock()
            .map_err(|_| anyhow!("search writer lock poisoned"))?;
        writer.delete_term(self.id_term(id));
        self.commit(&mut writer)
    }

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<(Uuid, f32)>> {
        if query.trim().is_empty() || limit == 0 {
            return Ok(Vec::new());
        }

        let searcher = self.reader.searcher();
        let top_docs = searcher.search(&self.build_query(query), &TopDocs::with_limit(limit))?;

        let mut results = Vec::with_capacity(top_docs.len());
        for (score, address) in top_docs {
            let doc: TantivyDocument = searcher.doc(address)?;
            let id = doc
                .get_first(self.id_field)
                .and_then(|value| value.as_str())
                .and_then(|raw| Uuid::parse_str(raw).ok());
            if let Some(id) = id {
                results.push((id, score));
            }
        }
        Ok(results)
    }
}
