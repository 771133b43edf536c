//! MCP Server for bookshelf-sync
//!
//! MCP Protocol (stdio) <-> application::Library (cache / search / forms / mutations)
//!
//! 7 tools: list_books, search_books, lookup_metadata, select_candidate,
//! add_book, edit_book, delete_book

use std::sync::Arc;

use rmcp::{
    handler::server::{tool::ToolCallContext, tool::ToolRouter, wrapper::Parameters},
    model::{
        CallToolRequestParams, CallToolResult, Content, Implementation, ListToolsResult,
        PaginatedRequestParams, ProtocolVersion, ServerCapabilities, ServerInfo,
    },
    service::{RequestContext, RoleServer},
    tool, tool_router,
    transport::stdio,
    ErrorData as McpError, ServerHandler, ServiceExt,
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::application::cache::CacheRead;
use crate::application::error::AppError;
use crate::application::form::EditBookForm;
use crate::application::library::Library;
use crate::config::AppConfig;
use crate::domain::model::book::{Book, BookDraft, BookPatch, Rating};
use crate::domain::model::metadata::MetadataCandidate;
use crate::infra::http_gateway::{GatewaySettings, HttpBookGateway};

// =============================================================================
// Public entry point
// =============================================================================

/// MCP Serverを起動する。
pub async fn run(config: AppConfig) -> anyhow::Result<()> {
    let gateway = HttpBookGateway::new(&GatewaySettings {
        library_base_url: config.library.base_url.clone(),
        metadata_search_url: config.metadata.search_url.clone(),
        timeout: config.http_timeout(),
        user_agent: config.http.user_agent.clone(),
    })?;
    let library = Library::new(gateway, config.search_settings());

    let server = BookshelfMcpServer::new(library);
    let service = server.serve(stdio()).await?;
    service.waiting().await?;
    Ok(())
}

// =============================================================================
// MCP Server
// =============================================================================

#[derive(Clone)]
struct BookshelfMcpServer {
    library: Arc<Library<HttpBookGateway>>,
    tool_router: ToolRouter<Self>,
}

impl BookshelfMcpServer {
    fn new(library: Library<HttpBookGateway>) -> Self {
        Self {
            library: Arc::new(library),
            tool_router: Self::tool_router(),
        }
    }

    fn to_mcp_error(e: AppError) -> McpError {
        match e {
            AppError::Domain(_) | AppError::CandidateNotFound(_) => {
                McpError::invalid_params(format!("{e}"), None)
            }
            other => McpError::internal_error(format!("{other}"), None),
        }
    }

    /// 未ロードなら1回フェッチしてからキャッシュを返す。
    async fn loaded_books(&self, refresh: bool) -> Result<Arc<Vec<Book>>, McpError> {
        let cache = &self.library.cache;
        if refresh || cache.read() == CacheRead::NotYetLoaded {
            cache
                .invalidate_and_refetch()
                .await
                .map_err(Self::to_mcp_error)?;
        }
        match cache.read() {
            CacheRead::Loaded(books) => Ok(books),
            CacheRead::NotYetLoaded => Err(McpError::internal_error(
                "Book collection is not loaded yet. Try again.",
                None,
            )),
        }
    }

    /// 一覧番号 / Full ID / IDプレフィックス / タイトル部分一致 → Book。
    ///
    /// 優先順位:
    /// 1. `list_books` 出力の番号（現在の検索語で絞り込んだ並び）
    /// 2. Full ID
    /// 3. IDプレフィックス
    /// 4. タイトル部分一致（フォールバック）
    async fn resolve_book(&self, s: &str) -> Result<Book, McpError> {
        let books = self.loaded_books(false).await?;

        if let Ok(num) = s.parse::<usize>() {
            let visible = self.library.search.visible_books().unwrap_or_default();
            if let Some(book) = num.checked_sub(1).and_then(|i| visible.get(i)) {
                return Ok(book.clone());
            }
        }

        if let Some(book) = books.iter().find(|b| b.id.as_str() == s) {
            return Ok(book.clone());
        }

        let id_matches: Vec<&Book> = books
            .iter()
            .filter(|b| b.id.as_str().starts_with(s))
            .collect();
        match id_matches.len() {
            1 => return Ok(id_matches[0].clone()),
            n if n > 1 => {
                return Err(McpError::invalid_params(
                    format!("Ambiguous ID prefix: '{s}' matches {n} books"),
                    None,
                ))
            }
            _ => {}
        }

        let query = s.to_lowercase();
        let title_matches: Vec<&Book> = books
            .iter()
            .filter(|b| b.title.to_lowercase().contains(&query))
            .collect();
        match title_matches.len() {
            0 => Err(McpError::invalid_params(
                format!("No book found matching: '{s}'. Run `list_books` to see IDs."),
                None,
            )),
            1 => Ok(title_matches[0].clone()),
            n => Err(McpError::invalid_params(
                format!(
                    "Ambiguous title match: '{s}' matches {n} books: {}",
                    title_matches
                        .iter()
                        .map(|b| format!("'{}' ({})", b.title, b.id.short()))
                        .collect::<Vec<_>>()
                        .join(", ")
                ),
                None,
            )),
        }
    }
}

// =============================================================================
// ServerHandler impl
// =============================================================================

impl ServerHandler for BookshelfMcpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2025_03_26,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: "bookshelf-sync".to_string(),
                title: Some("Bookshelf Sync: personal book library".to_string()),
                description: Some(
                    "List, search, add, edit and delete books on a library backend. \
                     New books can be pre-filled from Open Library."
                        .to_string(),
                ),
                version: env!("CARGO_PKG_VERSION").to_string(),
                icons: None,
                website_url: None,
            },
            instructions: Some(
                "Manage a personal book library.\n\
                 \n\
                 Intended flow: `list_books` to see the collection, `search_books` to narrow it. \
                 To add a book, `lookup_metadata` → `select_candidate` → `add_book` (or fill fields \
                 directly in `add_book`).\n\
                 \n\
                 Books are referenced by the number from `list_books`, an ID (prefix), or a title."
                    .to_string(),
            ),
        }
    }

    async fn list_tools(
        &self,
        _request: Option<PaginatedRequestParams>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, McpError> {
        Ok(ListToolsResult {
            tools: self.tool_router.list_all(),
            next_cursor: None,
            meta: None,
        })
    }

    async fn call_tool(
        &self,
        request: CallToolRequestParams,
        context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, McpError> {
        let tool_ctx = ToolCallContext::new(self, request, context);
        self.tool_router.call(tool_ctx).await
    }
}

// =============================================================================
// Request types
// =============================================================================

fn parse_rating(value: Option<Option<u8>>) -> Result<Option<Option<Rating>>, McpError> {
    value
        .map(|inner| {
            inner
                .map(|r| Rating::new(i64::from(r)))
                .transpose()
                .map_err(|e| McpError::invalid_params(format!("{e}"), None))
        })
        .transpose()
}

/// 省略 → None、null → Some(None)、値 → Some(Some(v))
fn double_option<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// MCP経由のテキストに含まれるリテラル `\n` を実際の改行に変換する。
fn unescape_newlines(s: &str) -> String {
    s.replace("\\n", "\n")
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
struct McpBookFields {
    #[schemars(description = "Book title")]
    pub title: Option<String>,
    #[schemars(description = "Author name")]
    pub author: Option<String>,
    #[schemars(description = "ISBN (null to clear)")]
    #[serde(default, deserialize_with = "double_option")]
    pub isbn: Option<Option<String>>,
    #[schemars(description = "Cover image URL (null to clear)")]
    #[serde(default, deserialize_with = "double_option")]
    pub cover_url: Option<Option<String>>,
    #[schemars(description = "Rating 0-5 (null to clear)")]
    #[serde(default, deserialize_with = "double_option")]
    pub rating: Option<Option<u8>>,
    #[schemars(description = "Whether the book has been read")]
    pub is_read: Option<bool>,
    #[schemars(description = "Free-form notes (null to clear)")]
    #[serde(default, deserialize_with = "double_option")]
    pub notes: Option<Option<String>>,
}

impl McpBookFields {
    fn into_patch(self) -> Result<BookPatch, McpError> {
        Ok(BookPatch {
            rating: parse_rating(self.rating)?,
            title: self.title,
            author: self.author,
            isbn: self.isbn,
            cover_url: self.cover_url,
            is_read: self.is_read,
            notes: self.notes.map(|n| n.map(|s| unescape_newlines(&s))),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
struct McpListBooksRequest {
    #[schemars(
        description = "Local filter on title/author/ISBN (case-insensitive). Omit to use the current search text."
    )]
    pub filter: Option<String>,
    #[schemars(description = "Refetch from the backend before listing (default: false)")]
    #[serde(default)]
    pub refresh: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
struct McpSearchBooksRequest {
    #[schemars(description = "Search text. Empty string shows the whole collection.")]
    pub query: String,
    #[schemars(
        description = "Search now instead of waiting for the quiet period (default: false)"
    )]
    #[serde(default)]
    pub immediate: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
struct McpLookupMetadataRequest {
    #[schemars(
        description = "Catalog search text (digits = ISBN, contains a space = title, otherwise author). Omit to re-run the current text."
    )]
    pub query: Option<String>,
    #[schemars(
        description = "Search now instead of waiting for the quiet period (default: true)"
    )]
    pub immediate: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
struct McpSelectCandidateRequest {
    #[schemars(description = "Candidate number from `lookup_metadata` output (1-based)")]
    pub number: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
struct McpAddBookRequest {
    #[serde(flatten)]
    pub fields: McpBookFields,
    #[schemars(
        description = "Submit the draft after applying fields (default: true). false only edits the draft."
    )]
    pub submit: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
struct McpEditBookRequest {
    #[schemars(description = "Book number from `list_books`, ID (prefix), or title")]
    pub book: String,
    #[serde(flatten)]
    pub fields: McpBookFields,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
struct McpDeleteBookRequest {
    #[schemars(description = "Book number from `list_books`, ID (prefix), or title")]
    pub book: String,
}

// =============================================================================
// Tool implementations
// =============================================================================

#[tool_router]
impl BookshelfMcpServer {
    #[tool(
        name = "list_books",
        description = "Show the book collection with numbered entries. Narrowed by the current search text unless `filter` is given.",
        annotations(
            read_only_hint = true,
            destructive_hint = false,
            open_world_hint = true
        )
    )]
    async fn list_books(
        &self,
        Parameters(req): Parameters<McpListBooksRequest>,
    ) -> Result<CallToolResult, McpError> {
        self.loaded_books(req.refresh).await?;
        let filter = req
            .filter
            .unwrap_or_else(|| self.library.search.query());
        let books = self
            .library
            .cache
            .filtered(&filter)
            .unwrap_or_default();

        if books.is_empty() {
            return Ok(CallToolResult::success(vec![Content::text(
                "No books. Use `add_book` to add one.",
            )]));
        }
        Ok(CallToolResult::success(vec![Content::text(format_books(
            &books, &filter,
        ))]))
    }

    #[tool(
        name = "search_books",
        description = "Type into the library search box. The backend search fires after the quiet period; set immediate=true to search now and return the results.",
        annotations(
            read_only_hint = true,
            destructive_hint = false,
            idempotent_hint = true,
            open_world_hint = true
        )
    )]
    async fn search_books(
        &self,
        Parameters(req): Parameters<McpSearchBooksRequest>,
    ) -> Result<CallToolResult, McpError> {
        let search = &self.library.search;
        search.type_query(&req.query);

        if !req.immediate {
            return Ok(CallToolResult::success(vec![Content::text(format!(
                "Search scheduled for '{}'. Run `list_books` to see results.",
                req.query
            ))]));
        }

        if let Some(handle) = search.search_now() {
            handle
                .await
                .map_err(|e| McpError::internal_error(format!("Search task failed: {e}"), None))?;
        }
        let books = search.visible_books().unwrap_or_default();
        Ok(CallToolResult::success(vec![Content::text(format_books(
            &books, &req.query,
        ))]))
    }

    #[tool(
        name = "lookup_metadata",
        description = "Search Open Library to pre-fill a new book. Needs at least 3 characters. Returns numbered candidates for `select_candidate`.",
        annotations(
            read_only_hint = true,
            destructive_hint = false,
            idempotent_hint = true,
            open_world_hint = true
        )
    )]
    async fn lookup_metadata(
        &self,
        Parameters(req): Parameters<McpLookupMetadataRequest>,
    ) -> Result<CallToolResult, McpError> {
        let metadata = &self.library.metadata;
        if let Some(query) = req.query.as_deref() {
            metadata.type_query(query);
        }

        if req.immediate.unwrap_or(true) {
            match metadata.search_now() {
                Some(handle) => handle.await.map_err(|e| {
                    McpError::internal_error(format!("Lookup task failed: {e}"), None)
                })?,
                None => {
                    return Err(McpError::invalid_params(
                        "Search text must be at least 3 characters.",
                        None,
                    ))
                }
            }
        }

        let state = self.library.add_form.snapshot();
        if state.is_searching {
            return Ok(CallToolResult::success(vec![Content::text(
                "Searching... run `lookup_metadata` again without a query to see results.",
            )]));
        }
        Ok(CallToolResult::success(vec![Content::text(
            format_candidates(&state.metadata_query, &state.candidates),
        )]))
    }

    #[tool(
        name = "select_candidate",
        description = "Fill the new-book draft from a `lookup_metadata` candidate. Clears the candidate list.",
        annotations(
            read_only_hint = false,
            destructive_hint = false,
            idempotent_hint = false,
            open_world_hint = false
        )
    )]
    async fn select_candidate(
        &self,
        Parameters(req): Parameters<McpSelectCandidateRequest>,
    ) -> Result<CallToolResult, McpError> {
        let index = req.number.checked_sub(1).ok_or_else(|| {
            McpError::invalid_params("Candidate numbers start at 1.", None)
        })?;
        let draft = self
            .library
            .metadata
            .select_candidate(index)
            .map_err(Self::to_mcp_error)?;
        Ok(CallToolResult::success(vec![Content::text(format!(
            "Draft filled:\n{}\nRun `add_book` to save (fields can be adjusted).",
            format_draft(&draft)
        ))]))
    }

    #[tool(
        name = "add_book",
        description = "Apply fields to the new-book draft and save it. The draft is cleared as soon as it is submitted.",
        annotations(
            read_only_hint = false,
            destructive_hint = false,
            idempotent_hint = false,
            open_world_hint = true
        )
    )]
    async fn add_book(
        &self,
        Parameters(req): Parameters<McpAddBookRequest>,
    ) -> Result<CallToolResult, McpError> {
        let form = &self.library.add_form;
        form.edit(req.fields.into_patch()?);

        if !req.submit.unwrap_or(true) {
            return Ok(CallToolResult::success(vec![Content::text(format!(
                "Draft updated:\n{}",
                format_draft(&form.draft())
            ))]));
        }

        let handle = self
            .library
            .service
            .submit_add_form(form)
            .map_err(Self::to_mcp_error)?;
        let book = handle
            .await
            .map_err(|e| McpError::internal_error(format!("Create task failed: {e}"), None))?
            .map_err(Self::to_mcp_error)?;

        Ok(CallToolResult::success(vec![Content::text(format!(
            "Added: {} by {} (id: {})",
            book.title, book.author, book.id
        ))]))
    }

    #[tool(
        name = "edit_book",
        description = "Edit a book's fields. Only specified fields are changed.",
        annotations(
            read_only_hint = false,
            destructive_hint = false,
            idempotent_hint = true,
            open_world_hint = true
        )
    )]
    async fn edit_book(
        &self,
        Parameters(req): Parameters<McpEditBookRequest>,
    ) -> Result<CallToolResult, McpError> {
        let book = self.resolve_book(&req.book).await?;
        let mut form = EditBookForm::new(book);
        form.edit(req.fields.into_patch()?);

        let updated = self
            .library
            .service
            .submit_edit_form(form)
            .await
            .map_err(Self::to_mcp_error)?;

        Ok(CallToolResult::success(vec![Content::text(format!(
            "Updated: {} by {} (id: {})",
            updated.title, updated.author, updated.id
        ))]))
    }

    #[tool(
        name = "delete_book",
        description = "Delete a book from the library.",
        annotations(
            read_only_hint = false,
            destructive_hint = true,
            idempotent_hint = false,
            open_world_hint = true
        )
    )]
    async fn delete_book(
        &self,
        Parameters(req): Parameters<McpDeleteBookRequest>,
    ) -> Result<CallToolResult, McpError> {
        let book = self.resolve_book(&req.book).await?;
        self.library
            .service
            .remove(&book.id)
            .await
            .map_err(Self::to_mcp_error)?;

        Ok(CallToolResult::success(vec![Content::text(format!(
            "Deleted: {} by {}",
            book.title, book.author
        ))]))
    }
}

// =============================================================================
// Helpers: text rendering
// =============================================================================

fn format_rating(rating: Option<Rating>) -> String {
    match rating {
        Some(r) => {
            let filled = usize::from(r.value());
            format!(
                "{}{}",
                "★".repeat(filled),
                "☆".repeat(usize::from(Rating::MAX_VALUE) - filled)
            )
        }
        None => String::new(),
    }
}

fn format_books(books: &[Book], filter: &str) -> String {
    let mut output = if filter.is_empty() {
        format!("# Library ({} books)\n\n", books.len())
    } else {
        format!("# Library: '{}' ({} books)\n\n", filter, books.len())
    };
    for (i, book) in books.iter().enumerate() {
        output.push_str(&format!("{}. {} by {}", i + 1, book.title, book.author));
        if let Some(isbn) = &book.isbn {
            output.push_str(&format!(" [ISBN {isbn}]"));
        }
        let stars = format_rating(book.rating);
        if !stars.is_empty() {
            output.push_str(&format!(" {stars}"));
        }
        if book.is_read {
            output.push_str(" (read)");
        }
        output.push_str(&format!(" id:{}\n", book.id.short()));
    }
    output
}

fn format_candidates(query: &str, candidates: &[MetadataCandidate]) -> String {
    if candidates.is_empty() {
        return format!("No catalog matches for '{query}'.");
    }
    let mut output = format!("# Catalog matches ({})\n\n", candidates.len());
    for (i, c) in candidates.iter().enumerate() {
        output.push_str(&format!("{}. {}", i + 1, c.title));
        if let Some(author) = c.primary_author() {
            output.push_str(&format!(" by {author}"));
        }
        if let Some(isbn) = c.primary_isbn() {
            output.push_str(&format!(" [ISBN {isbn}]"));
        }
        output.push('\n');
    }
    output
}

fn format_draft(draft: &BookDraft) -> String {
    let mut output = format!("  title: {}\n  author: {}\n", draft.title, draft.author);
    if let Some(isbn) = &draft.isbn {
        output.push_str(&format!("  isbn: {isbn}\n"));
    }
    if let Some(cover) = &draft.cover_url {
        output.push_str(&format!("  cover: {cover}\n"));
    }
    if draft.rating.is_some() {
        output.push_str(&format!("  rating: {}\n", format_rating(draft.rating)));
    }
    output.push_str(&format!("  read: {}\n", draft.is_read));
    if let Some(notes) = &draft.notes {
        output.push_str(&format!("  notes: {notes}\n"));
    }
    output
}

// =============================================================================
// Tests
// =============================================================================
