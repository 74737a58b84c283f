//! Remote list over the notes changes API
//!
//! The service exchanges whole node trees: every call to `changes` pushes the
//! locally modified nodes and pulls everything that changed since the last
//! version the client saw. Edits are buffered as dirty nodes until the next
//! sync, so `add_item` and `delete_item` never touch the network.

use std::collections::{BTreeSet, HashMap};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{SubsecRound, Utc};
use rand::Rng;
use reqwest::header::AUTHORIZATION;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use tracing::debug;
use url::Url;

use super::session::Session;
use crate::error::{Result, SyncError};
use crate::model::{epoch, ListItem, ListSnapshot, StoreKind, Timestamp};
use crate::store::{ListReader, RemoteList};

pub const API_URL: &str = "https://www.googleapis.com/notes/v1/";

const CAPABILITIES: &[&str] = &[
    "NC", "PI", "LB", "AN", "SH", "DR", "TR", "IN", "SNB", "MI", "CO",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NodeType {
    Note,
    List,
    ListItem,
    Blob,
    #[serde(other)]
    Other,
}

/// Timestamps in the service's millisecond format
mod keep_time {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        time: &DateTime<Utc>,
        serializer: S,
    ) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&format(time))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> std::result::Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        DateTime::parse_from_rfc3339(&raw)
            .map(|t| t.with_timezone(&Utc))
            .map_err(serde::de::Error::custom)
    }

    pub fn format(time: &DateTime<Utc>) -> String {
        time.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
    }
}

fn timestamps_kind() -> String {
    "notes#timestamps".to_string()
}

fn node_kind() -> String {
    "notes#node".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeTimestamps {
    #[serde(default = "timestamps_kind")]
    pub kind: String,
    #[serde(default = "epoch", with = "keep_time")]
    pub created: Timestamp,
    #[serde(default = "epoch", with = "keep_time")]
    pub updated: Timestamp,
    #[serde(default = "epoch", with = "keep_time")]
    pub trashed: Timestamp,
    #[serde(default = "epoch", with = "keep_time")]
    pub deleted: Timestamp,
    #[serde(default = "epoch", with = "keep_time")]
    pub user_edited: Timestamp,
}

impl NodeTimestamps {
    fn created_at(now: Timestamp) -> Self {
        Self {
            created: now,
            updated: now,
            user_edited: now,
            ..Self::default()
        }
    }
}

impl Default for NodeTimestamps {
    fn default() -> Self {
        Self {
            kind: timestamps_kind(),
            created: epoch(),
            updated: epoch(),
            trashed: epoch(),
            deleted: epoch(),
            user_edited: epoch(),
        }
    }
}

/// One node of the account's tree. Fields this tool does not use are kept
/// in `extra` so pushing a node back never drops them.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    #[serde(default = "node_kind")]
    pub kind: String,
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_id: Option<String>,
    #[serde(default)]
    pub parent_id: String,
    #[serde(rename = "type")]
    pub node_type: NodeType,
    #[serde(default)]
    pub timestamps: NodeTimestamps,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checked: Option<bool>,
    #[serde(
        default,
        deserialize_with = "sort_value",
        skip_serializing_if = "Option::is_none"
    )]
    pub sort_value: Option<i64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

// The service sends sort values as strings and accepts numbers
fn sort_value<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<Option<i64>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(i64),
        Text(String),
    }

    match Option::<Raw>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Raw::Number(n)) => Ok(Some(n)),
        Some(Raw::Text(s)) => s.parse().map(Some).map_err(serde::de::Error::custom),
    }
}

impl Node {
    fn new(node_type: NodeType, parent_id: &str, now: Timestamp) -> Self {
        Self {
            kind: node_kind(),
            id: generate_id(now),
            server_id: None,
            parent_id: parent_id.to_string(),
            node_type,
            timestamps: NodeTimestamps::created_at(now),
            title: None,
            text: None,
            checked: None,
            sort_value: None,
            extra: Map::new(),
        }
    }

    /// Deleted or trashed nodes are invisible.
    pub fn is_visible(&self) -> bool {
        self.timestamps.deleted <= epoch() && self.timestamps.trashed <= epoch()
    }

    fn matches_id(&self, id: &str) -> bool {
        self.id == id || self.server_id.as_deref() == Some(id)
    }

    fn to_item(&self) -> ListItem {
        ListItem {
            text: self.text.clone().unwrap_or_default(),
            done: self.checked.unwrap_or(false),
        }
    }
}

/// Current time at the service's millisecond precision, so a node held in
/// memory carries the same timestamps the server stores for it.
fn stamp() -> Timestamp {
    Utc::now().trunc_subsecs(3)
}

/// `<ms-hex>.<16 hex random>`
fn generate_id(now: Timestamp) -> String {
    let random: u64 = rand::thread_rng().gen();
    format!("{:x}.{:016x}", now.timestamp_millis(), random)
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ChangesRequest<'a> {
    nodes: Vec<&'a Node>,
    client_timestamp: String,
    request_header: RequestHeader<'a>,
    #[serde(skip_serializing_if = "Option::is_none")]
    target_version: Option<&'a str>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RequestHeader<'a> {
    client_session_id: &'a str,
    client_platform: &'static str,
    client_version: ClientVersion,
    capabilities: Vec<Capability>,
}

#[derive(Serialize)]
struct ClientVersion {
    major: &'static str,
    minor: &'static str,
    build: &'static str,
    revision: &'static str,
}

#[derive(Serialize)]
struct Capability {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChangesResponse {
    #[serde(default)]
    to_version: Option<String>,
    #[serde(default)]
    nodes: Vec<Node>,
    #[serde(default)]
    truncated: bool,
    #[serde(default)]
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    code: u16,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Clone, Copy)]
enum Stage {
    Read,
    Flush,
}

impl Stage {
    fn error(self, reason: impl std::fmt::Display) -> SyncError {
        match self {
            Stage::Read => SyncError::unavailable(StoreKind::Remote, reason),
            Stage::Flush => SyncError::mutation(StoreKind::Remote, "flush", reason),
        }
    }
}

/// Client-side copy of the account's node tree
pub struct KeepClient {
    client: Client,
    changes_url: Url,
    bearer: String,
    session_id: String,
    version: Option<String>,
    nodes: HashMap<String, Node>,
    dirty: BTreeSet<String>,
}

impl KeepClient {
    pub fn new(session: &Session, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("keep-list-sync/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()?;
        let now = Utc::now();
        let session_id = format!(
            "s--{}--{}",
            now.timestamp_millis(),
            rand::thread_rng().gen_range(1_000_000_000u64..10_000_000_000)
        );

        Ok(Self {
            client,
            changes_url: Url::parse(API_URL)
                .and_then(|base| base.join("changes"))
                .map_err(|e| SyncError::Config(e.to_string()))?,
            bearer: session.access_token().to_string(),
            session_id,
            version: None,
            nodes: HashMap::new(),
            dirty: BTreeSet::new(),
        })
    }

    /// Talk to a different API root. Must end with `/`.
    pub fn with_base_url(mut self, base: &Url) -> Result<Self> {
        self.changes_url = base
            .join("changes")
            .map_err(|e| SyncError::Config(e.to_string()))?;
        Ok(self)
    }

    /// Whether any edits are waiting to be pushed.
    pub fn is_dirty(&self) -> bool {
        !self.dirty.is_empty()
    }

    /// Push dirty nodes and pull changes until the server has nothing more.
    async fn sync(&mut self, stage: Stage) -> Result<()> {
        loop {
            let request = {
                let body = ChangesRequest {
                    nodes: self
                        .dirty
                        .iter()
                        .filter_map(|id| self.nodes.get(id))
                        .collect(),
                    client_timestamp: keep_time::format(&Utc::now()),
                    request_header: RequestHeader {
                        client_session_id: &self.session_id,
                        client_platform: "ANDROID",
                        client_version: ClientVersion {
                            major: "9",
                            minor: "9",
                            build: "9",
                            revision: "9",
                        },
                        capabilities: CAPABILITIES
                            .iter()
                            .map(|&kind| Capability { kind })
                            .collect(),
                    },
                    target_version: self.version.as_deref(),
                };
                debug!(pushed = body.nodes.len(), "syncing notes");

                self.client
                    .post(self.changes_url.clone())
                    .header(AUTHORIZATION, format!("OAuth {}", self.bearer))
                    .json(&body)
            };

            let response = request.send().await.map_err(|e| stage.error(e))?;
            let status = response.status();
            if status == StatusCode::UNAUTHORIZED {
                return Err(SyncError::AuthExpired("notes API returned 401".into()));
            }
            if !status.is_success() {
                return Err(stage.error(format!("notes API returned {}", status)));
            }

            let changes: ChangesResponse = response.json().await.map_err(|e| stage.error(e))?;
            if let Some(error) = changes.error {
                let message = error.message.unwrap_or_default();
                if error.code == 401 {
                    return Err(SyncError::AuthExpired(message));
                }
                return Err(stage.error(format!("notes API error {}: {}", error.code, message)));
            }

            self.dirty.clear();
            for node in changes.nodes {
                self.nodes.insert(node.id.clone(), node);
            }
            if changes.to_version.is_some() {
                self.version = changes.to_version;
            }
            if !changes.truncated {
                return Ok(());
            }
        }
    }

    /// Pull the latest tree, pushing pending edits first.
    pub async fn refresh(&mut self) -> Result<()> {
        self.sync(Stage::Read).await
    }

    /// Push pending edits.
    pub async fn flush(&mut self) -> Result<()> {
        self.sync(Stage::Flush).await
    }

    fn list_node(&self, list_id: &str) -> Option<&Node> {
        self.nodes
            .values()
            .find(|n| n.node_type == NodeType::List && n.matches_id(list_id) && n.is_visible())
    }

    /// Visible items of a list in display order.
    fn items_of(&self, list_key: &str) -> Vec<&Node> {
        let mut items: Vec<&Node> = self
            .nodes
            .values()
            .filter(|n| {
                n.node_type == NodeType::ListItem && n.parent_id == list_key && n.is_visible()
            })
            .collect();
        items.sort_by(|a, b| {
            b.sort_value
                .unwrap_or(0)
                .cmp(&a.sort_value.unwrap_or(0))
                .then_with(|| a.id.cmp(&b.id))
        });
        items
    }

    fn resolve(&self, list_id: &str) -> Result<String> {
        self.list_node(list_id)
            .map(|n| n.id.clone())
            .ok_or_else(|| SyncError::unavailable(StoreKind::Remote, "list not found"))
    }

    fn touch(&mut self, key: &str, now: Timestamp) {
        if let Some(list) = self.nodes.get_mut(key) {
            list.timestamps.updated = now;
            list.timestamps.user_edited = now;
            self.dirty.insert(key.to_string());
        }
    }

    pub fn snapshot(&self, list_id: &str) -> Result<ListSnapshot> {
        let list = self
            .list_node(list_id)
            .ok_or_else(|| SyncError::unavailable(StoreKind::Remote, "list not found"))?;
        let items = self.items_of(&list.id).into_iter().map(Node::to_item).collect();
        Ok(ListSnapshot::new(items, list.timestamps.updated))
    }

    /// Append an unchecked item at the bottom of the list.
    pub fn add_item(&mut self, list_id: &str, text: &str) -> Result<()> {
        let key = self.resolve(list_id)?;
        let now = stamp();

        let lowest = self
            .items_of(&key)
            .iter()
            .filter_map(|n| n.sort_value)
            .min();
        let sort_value = match lowest {
            Some(v) => v - 1,
            None => rand::thread_rng().gen_range(1_000_000_000i64..10_000_000_000),
        };

        let mut node = Node::new(NodeType::ListItem, &key, now);
        node.text = Some(text.to_string());
        node.checked = Some(false);
        node.sort_value = Some(sort_value);

        debug!(id = %node.id, "queued remote item");
        self.dirty.insert(node.id.clone());
        self.nodes.insert(node.id.clone(), node);
        self.touch(&key, now);
        Ok(())
    }

    /// Mark the first visible item matching `item` as deleted.
    pub fn delete_item(&mut self, list_id: &str, item: &ListItem) -> Result<()> {
        let key = self.resolve(list_id)?;
        let now = stamp();

        let target = self
            .items_of(&key)
            .into_iter()
            .find(|n| n.to_item() == *item)
            .map(|n| n.id.clone())
            .ok_or_else(|| SyncError::ItemNotFound {
                store: StoreKind::Remote,
                text: item.text.clone(),
            })?;

        if let Some(node) = self.nodes.get_mut(&target) {
            node.timestamps.deleted = now;
            node.timestamps.updated = now;
        }
        self.dirty.insert(target);
        self.touch(&key, now);
        Ok(())
    }

    /// Id of the first visible list with this title.
    pub fn find_list_by_title(&self, title: &str) -> Option<String> {
        self.nodes
            .values()
            .filter(|n| n.node_type == NodeType::List && n.is_visible())
            .find(|n| n.title.as_deref() == Some(title))
            .map(|n| n.server_id.clone().unwrap_or_else(|| n.id.clone()))
    }

    /// Queue a new empty list and return its id.
    pub fn create_list(&mut self, title: &str) -> String {
        let now = stamp();
        let mut node = Node::new(NodeType::List, "root", now);
        node.title = Some(title.to_string());
        node.text = Some(String::new());
        node.sort_value = Some(rand::thread_rng().gen_range(1_000_000_000i64..10_000_000_000));

        let id = node.id.clone();
        self.dirty.insert(id.clone());
        self.nodes.insert(id.clone(), node);
        id
    }
}

/// One list of the account, as a sync endpoint
pub struct KeepList {
    client: KeepClient,
    list_id: String,
}

impl KeepList {
    pub fn new(client: KeepClient, list_id: impl Into<String>) -> Self {
        Self {
            client,
            list_id: list_id.into(),
        }
    }
}

#[async_trait]
impl ListReader for KeepList {
    fn kind(&self) -> StoreKind {
        StoreKind::Remote
    }

    async fn read(&mut self) -> Result<ListSnapshot> {
        self.client.refresh().await?;
        self.client.snapshot(&self.list_id)
    }
}

#[async_trait]
impl RemoteList for KeepList {
    async fn add_item(&mut self, text: &str) -> Result<()> {
        self.client.add_item(&self.list_id, text)
    }

    async fn delete_item(&mut self, item: &ListItem) -> Result<()> {
        self.client.delete_item(&self.list_id, item)
    }

    async fn flush(&mut self) -> Result<()> {
        self.client.flush().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const ZERO: &str = "1970-01-01T00:00:00.000Z";

    fn list_node(id: &str, title: &str, updated: &str) -> Value {
        json!({
            "kind": "notes#node",
            "id": id,
            "serverId": format!("srv-{}", id),
            "parentId": "root",
            "type": "LIST",
            "title": title,
            "color": "DEFAULT",
            "timestamps": {
                "kind": "notes#timestamps",
                "created": "2024-03-01T09:00:00.000Z",
                "updated": updated,
                "trashed": ZERO,
                "deleted": ZERO
            }
        })
    }

    fn item_node(id: &str, parent: &str, text: &str, checked: bool, sort: &str) -> Value {
        json!({
            "kind": "notes#node",
            "id": id,
            "parentId": parent,
            "type": "LIST_ITEM",
            "text": text,
            "checked": checked,
            "sortValue": sort,
            "timestamps": {
                "created": "2024-03-01T09:00:00.000Z",
                "updated": "2024-03-01T09:00:00.000Z",
                "trashed": ZERO,
                "deleted": ZERO
            }
        })
    }

    fn page(nodes: Vec<Value>, version: &str, truncated: bool) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(json!({
            "kind": "notes#downSync",
            "toVersion": version,
            "truncated": truncated,
            "nodes": nodes
        }))
    }

    fn groceries() -> Vec<Value> {
        let mut gone = item_node("i4", "l1", "old", false, "5");
        gone["timestamps"]["deleted"] = json!("2024-03-01T09:30:00.000Z");
        vec![
            list_node("l1", "Groceries", "2024-03-01T10:00:00.123Z"),
            item_node("i1", "l1", "bread", false, "100"),
            item_node("i2", "l1", "milk", true, "300"),
            item_node("i3", "l1", "eggs", false, "200"),
            gone,
        ]
    }

    fn client_for(server: &MockServer) -> KeepClient {
        let session = Session::new("user@example.com", "master", "bearer-1");
        let base = Url::parse(&format!("{}/notes/v1/", server.uri())).unwrap();
        KeepClient::new(&session, Duration::from_secs(5))
            .unwrap()
            .with_base_url(&base)
            .unwrap()
    }

    fn sent_nodes(request: &wiremock::Request) -> Vec<Value> {
        let body: Value = serde_json::from_slice(&request.body).unwrap();
        body["nodes"].as_array().cloned().unwrap_or_default()
    }

    #[tokio::test]
    async fn test_read_orders_items_and_hides_deleted() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/notes/v1/changes"))
            .and(header("authorization", "OAuth bearer-1"))
            .respond_with(page(groceries(), "v1", false))
            .expect(1)
            .mount(&server)
            .await;

        let mut list = KeepList::new(client_for(&server), "srv-l1");
        let snapshot = list.read().await.unwrap();

        assert_eq!(
            snapshot.items,
            vec![
                ListItem::checked("milk"),
                ListItem::unchecked("eggs"),
                ListItem::unchecked("bread"),
            ]
        );
        assert_eq!(
            keep_time::format(&snapshot.modified_at),
            "2024-03-01T10:00:00.123Z"
        );
    }

    #[tokio::test]
    async fn test_truncated_responses_are_followed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(page(vec![list_node("l1", "Groceries", ZERO)], "v1", true))
            .up_to_n_times(1)
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(body_string_contains(r#""targetVersion":"v1""#))
            .respond_with(page(
                vec![item_node("i1", "l1", "tea", false, "1")],
                "v2",
                false,
            ))
            .expect(1)
            .mount(&server)
            .await;

        let mut list = KeepList::new(client_for(&server), "l1");
        let snapshot = list.read().await.unwrap();
        assert_eq!(snapshot.unchecked_texts(), vec!["tea"]);
    }

    #[tokio::test]
    async fn test_unauthorized_is_auth_expired() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let mut list = KeepList::new(client_for(&server), "l1");
        let err = list.read().await.unwrap_err();
        assert!(matches!(err, SyncError::AuthExpired(_)));
    }

    #[tokio::test]
    async fn test_server_error_on_read_is_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let mut list = KeepList::new(client_for(&server), "l1");
        let err = list.read().await.unwrap_err();
        assert!(matches!(
            err,
            SyncError::SourceUnavailable {
                store: StoreKind::Remote,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_missing_list_is_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(page(groceries(), "v1", false))
            .mount(&server)
            .await;

        let mut list = KeepList::new(client_for(&server), "nope");
        let err = list.read().await.unwrap_err();
        assert!(err.to_string().contains("list not found"));
    }

    #[tokio::test]
    async fn test_edits_are_buffered_until_flush() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(page(groceries(), "v1", false))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(page(vec![], "v2", false))
            .mount(&server)
            .await;

        let mut list = KeepList::new(client_for(&server), "l1");
        list.read().await.unwrap();

        list.delete_item(&ListItem::checked("milk")).await.unwrap();
        list.add_item("jam").await.unwrap();
        assert_eq!(server.received_requests().await.unwrap().len(), 1);

        list.flush().await.unwrap();
        let requests = server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 2);

        let nodes = sent_nodes(&requests[1]);
        let deleted = nodes.iter().find(|n| n["id"] == "i2").unwrap();
        assert_ne!(deleted["timestamps"]["deleted"], ZERO);

        let added = nodes.iter().find(|n| n["text"] == "jam").unwrap();
        assert_eq!(added["type"], "LIST_ITEM");
        assert_eq!(added["parentId"], "l1");
        assert_eq!(added["checked"], false);
        assert_eq!(added["sortValue"], 99);

        let parent = nodes.iter().find(|n| n["id"] == "l1").unwrap();
        assert_eq!(parent["color"], "DEFAULT");
        assert_ne!(parent["timestamps"]["updated"], "2024-03-01T10:00:00.123Z");
    }

    #[tokio::test]
    async fn test_flush_failure_is_mutation_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(page(groceries(), "v1", false))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let mut list = KeepList::new(client_for(&server), "l1");
        list.read().await.unwrap();
        list.add_item("jam").await.unwrap();

        let err = list.flush().await.unwrap_err();
        assert!(matches!(
            err,
            SyncError::MutationFailed {
                store: StoreKind::Remote,
                op: "flush",
                ..
            }
        ));
    }

    #[test]
    fn test_delete_unknown_item_is_not_found() {
        let mut client = KeepClient::new(
            &Session::new("a@b.c", "m", "b"),
            Duration::from_secs(1),
        )
        .unwrap();
        let id = client.create_list("Groceries");

        let err = client
            .delete_item(&id, &ListItem::unchecked("ghost"))
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_added_items_keep_insertion_order() {
        let mut client = KeepClient::new(
            &Session::new("a@b.c", "m", "b"),
            Duration::from_secs(1),
        )
        .unwrap();
        let id = client.create_list("Groceries");

        for text in ["a", "b", "c"] {
            client.add_item(&id, text).unwrap();
        }

        let snapshot = client.snapshot(&id).unwrap();
        assert_eq!(snapshot.unchecked_texts(), vec!["a", "b", "c"]);
        assert!(client.is_dirty());
        assert_eq!(client.find_list_by_title("Groceries"), Some(id));
        assert_eq!(client.find_list_by_title("Hardware"), None);
    }

    #[test]
    fn test_local_edits_stamp_whole_milliseconds() {
        let mut client = KeepClient::new(
            &Session::new("a@b.c", "m", "b"),
            Duration::from_secs(1),
        )
        .unwrap();
        let id = client.create_list("Groceries");
        client.add_item(&id, "tea").unwrap();
        client.delete_item(&id, &ListItem::unchecked("tea")).unwrap();

        let modified = client.snapshot(&id).unwrap().modified_at;
        assert_eq!(modified.timestamp_subsec_nanos() % 1_000_000, 0);

        let wire = keep_time::format(&modified);
        let parsed = chrono::DateTime::parse_from_rfc3339(&wire)
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(parsed, modified);
    }

    #[test]
    fn test_node_accepts_numeric_and_string_sort_values() {
        let node: Node = serde_json::from_value(item_node("i1", "l1", "x", false, "42")).unwrap();
        assert_eq!(node.sort_value, Some(42));

        let mut raw = item_node("i1", "l1", "x", false, "0");
        raw["sortValue"] = json!(-7);
        let node: Node = serde_json::from_value(raw).unwrap();
        assert_eq!(node.sort_value, Some(-7));
        assert_eq!(node.timestamps.user_edited, epoch());
    }

    #[test]
    fn test_generated_id_shape() {
        let id = generate_id(Utc::now());
        let (millis, random) = id.split_once('.').unwrap();
        assert!(u64::from_str_radix(millis, 16).is_ok());
        assert_eq!(random.len(), 16);
    }
}
