//! Async navigation pipeline and the single-writer view state container.

use std::collections::HashSet;
use std::sync::Arc;

use anyhow::anyhow;
use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::error::{LibError, Result};
use crate::models::{GroupId, Resource, ResourceGroup, ResourceId, ResourceType, ResourceTypeId};
use crate::navigation::{DEFAULT_PRODUCT_NAME, ViewPath};
use crate::notify::{Message, NotificationSink};
use crate::permissions::Permission;
use crate::views::{
    DEFAULT_VIEW, DetailAction, DetailEntity, DetailFamily, DetailNavigator, DetailTarget,
    INVENTORY_VIEW, Route,
};

const MAX_REDIRECTS: usize = 3;
const REQUEST_QUEUE_DEPTH: usize = 16;

/// Which hidden groups a group lookup may return.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupVisibility {
    Visible,
    AutoCluster,
    AutoGroup,
}

#[async_trait]
pub trait EntityLoader: Send + Sync {
    async fn resource(&self, id: ResourceId) -> Result<Option<Resource>>;

    async fn group(&self, id: GroupId, visibility: GroupVisibility) -> Result<Option<ResourceGroup>>;

    async fn resource_type(&self, id: ResourceTypeId) -> Result<Option<ResourceType>>;
}

#[async_trait]
pub trait PreferencesStore: Send + Sync {
    async fn add_recent_resource(&self, id: ResourceId) -> Result<()>;

    async fn add_recent_group(&self, id: GroupId) -> Result<()>;
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum LoadedEntity {
    Resource(Resource),
    Group(ResourceGroup),
}

impl LoadedEntity {
    fn type_id(&self) -> Option<ResourceTypeId> {
        match self {
            LoadedEntity::Resource(resource) => Some(resource.type_id),
            LoadedEntity::Group(group) => group.type_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DetailView {
    pub target: DetailTarget,
    pub entity: LoadedEntity,
    pub resource_type: Option<ResourceType>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DetailOutcome {
    /// The path ended before an entity id.
    Landing(DetailFamily),
    Loaded(DetailView),
    TabSelected(DetailView),
    Redirect { to: String },
}

/// Loads detail-view entities: fetch entity, fetch type metadata, record the
/// visit, select the tab. Failures post a warning and redirect to inventory.
pub struct DetailController {
    loader: Arc<dyn EntityLoader>,
    preferences: Arc<dyn PreferencesStore>,
    sink: Arc<dyn NotificationSink>,
    resources: DetailNavigator,
    groups: DetailNavigator,
    current: Option<DetailView>,
}

impl DetailController {
    pub fn new(
        loader: Arc<dyn EntityLoader>,
        preferences: Arc<dyn PreferencesStore>,
        sink: Arc<dyn NotificationSink>,
    ) -> Self {
        Self {
            loader,
            preferences,
            sink,
            resources: DetailNavigator::new(DetailFamily::Resource),
            groups: DetailNavigator::new(DetailFamily::ResourceGroup),
            current: None,
        }
    }

    pub fn current(&self) -> Option<&DetailView> {
        self.current.as_ref()
    }

    fn navigator_mut(&mut self, family: DetailFamily) -> &mut DetailNavigator {
        match family {
            DetailFamily::Resource => &mut self.resources,
            DetailFamily::ResourceGroup => &mut self.groups,
        }
    }

    pub async fn render(&mut self, family: DetailFamily, path: &mut ViewPath) -> Result<DetailOutcome> {
        let navigator = self.navigator_mut(family);
        let Some(target) = navigator.parse_target(path)? else {
            return Ok(DetailOutcome::Landing(family));
        };

        match navigator.plan(target, path.is_refresh()) {
            DetailAction::SelectTab(target) => {
                if let Some(current) = self.current.as_mut().filter(|view| view.target.entity == target.entity) {
                    current.target = target;
                    return Ok(DetailOutcome::TabSelected(current.clone()));
                }
                self.load(family, target).await
            }
            DetailAction::Reload(target) => self.load(family, target).await,
        }
    }

    async fn load(&mut self, family: DetailFamily, target: DetailTarget) -> Result<DetailOutcome> {
        let entity = target.entity;
        tracing::debug!(%entity, "loading detail view");

        let loaded = match self.fetch_entity(entity).await {
            Ok(Some(loaded)) => loaded,
            Ok(None) => {
                return Ok(self.redirect_after_failure(
                    family,
                    entity,
                    format!("{} with id [{}] does not exist.", noun(entity), entity.raw_id()),
                ));
            }
            Err(err) => return Ok(self.redirect_after_failure(family, entity, err.to_string())),
        };

        let resource_type = match loaded.type_id() {
            Some(type_id) => match self.loader.resource_type(type_id).await {
                Ok(Some(resource_type)) => Some(resource_type),
                Ok(None) => {
                    return Ok(self.redirect_after_failure(
                        family,
                        entity,
                        format!("Resource type [{type_id}] does not exist."),
                    ));
                }
                Err(err) => return Ok(self.redirect_after_failure(family, entity, err.to_string())),
            },
            None => None,
        };

        self.record_recent_view(entity).await;

        let view = DetailView {
            target,
            entity: loaded,
            resource_type,
        };
        self.navigator_mut(family).mark_loaded(entity);
        self.current = Some(view.clone());
        Ok(DetailOutcome::Loaded(view))
    }

    async fn fetch_entity(&self, entity: DetailEntity) -> Result<Option<LoadedEntity>> {
        let loaded = match entity {
            DetailEntity::Resource(id) => self.loader.resource(id).await?.map(LoadedEntity::Resource),
            DetailEntity::Group(id) => self
                .loader
                .group(id, GroupVisibility::Visible)
                .await?
                .map(LoadedEntity::Group),
            DetailEntity::AutoGroup(id) => self
                .loader
                .group(id, GroupVisibility::AutoGroup)
                .await?
                .map(LoadedEntity::Group),
            DetailEntity::AutoCluster(id) => self
                .loader
                .group(id, GroupVisibility::AutoCluster)
                .await?
                .map(LoadedEntity::Group),
        };
        Ok(loaded)
    }

    /// Recently-viewed bookkeeping never fails navigation.
    async fn record_recent_view(&self, entity: DetailEntity) {
        if !entity.records_recent_view() {
            return;
        }
        let recorded = match entity {
            DetailEntity::Resource(id) => self.preferences.add_recent_resource(id).await,
            DetailEntity::Group(id) => self.preferences.add_recent_group(id).await,
            DetailEntity::AutoGroup(_) | DetailEntity::AutoCluster(_) => Ok(()),
        };
        if let Err(err) = recorded {
            tracing::error!(%entity, error = %err, "unable to update recently viewed entities");
        }
    }

    fn redirect_after_failure(
        &mut self,
        family: DetailFamily,
        entity: DetailEntity,
        detail: String,
    ) -> DetailOutcome {
        tracing::warn!(%entity, %detail, "detail view failed to load");
        self.navigator_mut(family).clear();
        self.current = None;
        self.sink.notify(
            Message::warning(format!(
                "Failed to load {} with id [{}]",
                noun(entity).to_lowercase(),
                entity.raw_id()
            ))
            .with_detail(detail),
        );
        DetailOutcome::Redirect {
            to: INVENTORY_VIEW.to_string(),
        }
    }
}

fn noun(entity: DetailEntity) -> &'static str {
    match entity {
        DetailEntity::Resource(_) => "Resource",
        DetailEntity::Group(_) | DetailEntity::AutoGroup(_) | DetailEntity::AutoCluster(_) => "Group",
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NavigationRequest {
    pub path: String,
    pub refresh: bool,
}

impl NavigationRequest {
    pub fn go(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            refresh: false,
        }
    }

    pub fn refresh(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            refresh: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewState {
    /// Incremented once per processed (possibly coalesced) request.
    pub generation: u64,
    pub path: String,
    pub title: String,
    pub route: Option<Route>,
    pub detail: Option<DetailView>,
    /// True when the detail entity was fetched rather than only re-tabbed.
    pub reloaded: bool,
    pub error: Option<String>,
}

enum Step {
    View(ViewState),
    Redirect(String),
}

/// Routes history tokens to views.
pub struct ViewController {
    details: DetailController,
    sink: Arc<dyn NotificationSink>,
    granted: HashSet<Permission>,
    product_name: String,
}

impl ViewController {
    pub fn new(details: DetailController, granted: HashSet<Permission>) -> Self {
        let sink = details.sink.clone();
        Self {
            details,
            sink,
            granted,
            product_name: DEFAULT_PRODUCT_NAME.to_string(),
        }
    }

    pub fn with_product_name(mut self, product_name: impl Into<String>) -> Self {
        self.product_name = product_name.into();
        self
    }

    pub async fn navigate(&mut self, request: &NavigationRequest) -> Result<ViewState> {
        let mut token = request.path.clone();
        for _ in 0..MAX_REDIRECTS {
            match self.render(&token, request.refresh).await? {
                Step::View(state) => return Ok(state),
                Step::Redirect(to) => {
                    tracing::debug!(from = %token, %to, "redirecting view");
                    token = to;
                }
            }
        }

        Err(LibError::unknown(
            "Too many view redirects",
            anyhow!("redirect limit reached at {token}"),
        ))
    }

    async fn render(&mut self, token: &str, refresh: bool) -> Result<Step> {
        let mut path = ViewPath::parse(token).with_refresh(refresh);
        let title = path.title(&self.product_name);
        let route = Route::parse(&mut path);
        route.authorize(&self.granted)?;

        let mut state = ViewState {
            path: path.to_string(),
            title,
            route: Some(route.clone()),
            ..ViewState::default()
        };

        match &route {
            Route::Default => return Ok(Step::Redirect(DEFAULT_VIEW.to_string())),
            Route::Unknown(view) => tracing::warn!(%view, "no view registered for path"),
            _ => {}
        }

        if let Some(family) = route.detail_family() {
            match self.details.render(family, &mut path).await? {
                DetailOutcome::Landing(_) => {}
                DetailOutcome::Loaded(view) => {
                    state.detail = Some(view);
                    state.reloaded = true;
                }
                DetailOutcome::TabSelected(view) => state.detail = Some(view),
                DetailOutcome::Redirect { to } => return Ok(Step::Redirect(to)),
            }
        }

        Ok(Step::View(state))
    }
}

/// Handle to the task that owns navigation state.
///
/// Requests queue on a channel; when several are waiting only the newest runs.
#[derive(Clone)]
pub struct ViewStateHandle {
    requests: mpsc::Sender<NavigationRequest>,
    state: watch::Receiver<ViewState>,
}

impl ViewStateHandle {
    pub fn spawn(controller: ViewController) -> (Self, JoinHandle<()>) {
        let (requests, rx) = mpsc::channel(REQUEST_QUEUE_DEPTH);
        let (state_tx, state) = watch::channel(ViewState::default());
        let task = tokio::spawn(run_view_state(controller, rx, state_tx));
        (Self { requests, state }, task)
    }

    pub async fn navigate(&self, request: NavigationRequest) -> Result<()> {
        self.requests.send(request).await.map_err(|err| {
            LibError::unknown("Navigation is no longer running", anyhow!(err.to_string()))
        })
    }

    pub fn current(&self) -> ViewState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ViewState> {
        self.state.clone()
    }

    /// Waits until a state with at least `generation` is published.
    pub async fn wait_for_generation(&self, generation: u64) -> Result<ViewState> {
        let mut state = self.state.clone();
        let published = state
            .wait_for(|current| current.generation >= generation)
            .await
            .map_err(|err| LibError::unknown("Navigation is no longer running", anyhow!(err)))?;
        Ok(published.clone())
    }
}

async fn run_view_state(
    mut controller: ViewController,
    mut requests: mpsc::Receiver<NavigationRequest>,
    state_tx: watch::Sender<ViewState>,
) {
    let mut generation = 0u64;
    while let Some(mut request) = requests.recv().await {
        while let Ok(newer) = requests.try_recv() {
            tracing::debug!(skipped = %request.path, next = %newer.path, "coalescing navigation request");
            request = newer;
        }

        generation += 1;
        let mut state = match controller.navigate(&request).await {
            Ok(state) => state,
            Err(err) => {
                tracing::error!(path = %request.path, kind = ?err.kind, error = %err.source, "navigation failed");
                controller
                    .sink
                    .notify(Message::error(err.public).with_detail(err.source.to_string()));
                ViewState {
                    path: request.path.clone(),
                    error: Some(err.public.to_string()),
                    ..ViewState::default()
                }
            }
        };
        state.generation = generation;
        state_tx.send_replace(state);
    }
    tracing::debug!("navigation requests closed, view state task exiting");
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use tokio::sync::Notify;

    use super::*;
    use crate::error::ErrorKind;
    use crate::models::{Availability, GroupCategory, ResourceCategory};
    use crate::notify::{MessageCenter, Severity};
    use crate::views::AdminPage;

    #[derive(Default)]
    struct FakeInventory {
        resources: HashMap<ResourceId, Resource>,
        groups: HashMap<GroupId, ResourceGroup>,
        types: HashMap<ResourceTypeId, ResourceType>,
        fail_resources: bool,
        fail_preferences: bool,
        loads: Mutex<Vec<ResourceId>>,
        recent: Mutex<Vec<i32>>,
        gate: Option<(Arc<Notify>, Arc<Notify>)>,
    }

    #[async_trait]
    impl EntityLoader for FakeInventory {
        async fn resource(&self, id: ResourceId) -> Result<Option<Resource>> {
            self.loads.lock().expect("loads").push(id);
            if let Some((entered, release)) = &self.gate {
                entered.notify_one();
                release.notified().await;
            }
            if self.fail_resources {
                return Err(LibError::database("Database request failed", anyhow!("connection reset")));
            }
            Ok(self.resources.get(&id).cloned())
        }

        async fn group(&self, id: GroupId, visibility: GroupVisibility) -> Result<Option<ResourceGroup>> {
            Ok(self.groups.get(&id).cloned().filter(|group| match visibility {
                GroupVisibility::Visible => group.cluster_key.is_none() && group.auto_group_parent_id.is_none(),
                GroupVisibility::AutoCluster => group.cluster_key.is_some(),
                GroupVisibility::AutoGroup => group.auto_group_parent_id.is_some(),
            }))
        }

        async fn resource_type(&self, id: ResourceTypeId) -> Result<Option<ResourceType>> {
            Ok(self.types.get(&id).cloned())
        }
    }

    #[async_trait]
    impl PreferencesStore for FakeInventory {
        async fn add_recent_resource(&self, id: ResourceId) -> Result<()> {
            if self.fail_preferences {
                return Err(LibError::message("Preferences unavailable"));
            }
            self.recent.lock().expect("recent").push(id.0);
            Ok(())
        }

        async fn add_recent_group(&self, id: GroupId) -> Result<()> {
            self.recent.lock().expect("recent").push(id.0);
            Ok(())
        }
    }

    fn inventory() -> FakeInventory {
        let mut inventory = FakeInventory::default();
        inventory.types.insert(
            ResourceTypeId(1),
            ResourceType {
                id: ResourceTypeId(1),
                name: "Linux".to_string(),
                plugin: "Platforms".to_string(),
                category: ResourceCategory::Platform,
                description: None,
                singleton: true,
                sub_category_id: None,
                child_type_ids: Vec::new(),
            },
        );
        for id in [10, 11, 12, 13] {
            inventory.resources.insert(
                ResourceId(id),
                Resource {
                    id: ResourceId(id),
                    name: format!("host-{id}"),
                    description: None,
                    parent_id: None,
                    type_id: ResourceTypeId(1),
                    availability: Availability::Up,
                    ancestry: None,
                },
            );
        }
        inventory.groups.insert(
            GroupId(50),
            ResourceGroup {
                id: GroupId(50),
                name: "host-10 ( Linux )".to_string(),
                description: None,
                category: GroupCategory::Compatible,
                type_id: Some(ResourceTypeId(1)),
                auto_group_parent_id: Some(ResourceId(10)),
                cluster_key: None,
            },
        );
        inventory
    }

    fn controller(inventory: Arc<FakeInventory>, sink: Arc<MessageCenter>) -> ViewController {
        let details = DetailController::new(inventory.clone(), inventory, sink);
        ViewController::new(details, HashSet::new())
    }

    #[tokio::test]
    async fn same_entity_selects_tab_and_refresh_reloads() {
        let inventory = Arc::new(inventory());
        let sink = Arc::new(MessageCenter::default());
        let mut views = controller(inventory.clone(), sink.clone());

        let first = views
            .navigate(&NavigationRequest::go("Resource/10/Summary"))
            .await
            .expect("first load");
        assert!(first.reloaded);
        assert_eq!(first.title, "RHQ: Resource | Summary");

        let tab = views
            .navigate(&NavigationRequest::go("Resource/10/Monitoring/Graphs"))
            .await
            .expect("tab switch");
        assert!(!tab.reloaded);
        let detail = tab.detail.expect("detail");
        assert_eq!(detail.target.tab.as_deref(), Some("Monitoring"));
        assert_eq!(detail.resource_type.map(|t| t.name).as_deref(), Some("Linux"));

        let refreshed = views
            .navigate(&NavigationRequest::refresh("Resource/10/Monitoring"))
            .await
            .expect("refresh");
        assert!(refreshed.reloaded);

        let other = views
            .navigate(&NavigationRequest::go("Resource/11"))
            .await
            .expect("other");
        assert!(other.reloaded);

        assert_eq!(*inventory.loads.lock().expect("loads"), vec![ResourceId(10), ResourceId(10), ResourceId(11)]);
        assert_eq!(*inventory.recent.lock().expect("recent"), vec![10, 10, 11]);
        assert!(sink.messages().is_empty());
    }

    #[tokio::test]
    async fn missing_entity_warns_and_redirects_to_inventory() {
        let inventory = Arc::new(inventory());
        let sink = Arc::new(MessageCenter::default());
        let mut views = controller(inventory, sink.clone());

        let state = views
            .navigate(&NavigationRequest::go("Resource/999/Summary"))
            .await
            .expect("redirected");
        assert_eq!(state.route, Some(Route::Inventory));
        assert_eq!(state.path, "Inventory");

        let message = sink.latest().expect("warning posted");
        assert_eq!(message.severity, Severity::Warning);
        assert_eq!(message.concise, "Failed to load resource with id [999]");
        assert_eq!(message.detail.as_deref(), Some("Resource with id [999] does not exist."));
    }

    #[tokio::test]
    async fn fetch_failure_redirects_without_retry() {
        let mut inventory = inventory();
        inventory.fail_resources = true;
        let inventory = Arc::new(inventory);
        let sink = Arc::new(MessageCenter::default());
        let mut views = controller(inventory.clone(), sink.clone());

        let state = views
            .navigate(&NavigationRequest::go("Resource/10"))
            .await
            .expect("redirected");
        assert_eq!(state.route, Some(Route::Inventory));
        assert_eq!(inventory.loads.lock().expect("loads").len(), 1);
        assert_eq!(sink.messages().len(), 1);
    }

    #[tokio::test]
    async fn recent_view_failure_is_only_logged() {
        let mut inventory = inventory();
        inventory.fail_preferences = true;
        let sink = Arc::new(MessageCenter::default());
        let mut views = controller(Arc::new(inventory), sink.clone());

        let state = views
            .navigate(&NavigationRequest::go("Resource/12"))
            .await
            .expect("loaded");
        assert!(state.detail.is_some());
        assert!(sink.messages().is_empty());
    }

    #[tokio::test]
    async fn auto_groups_load_hidden_groups_without_recording() {
        let inventory = Arc::new(inventory());
        let sink = Arc::new(MessageCenter::default());
        let mut views = controller(inventory.clone(), sink);

        let state = views
            .navigate(&NavigationRequest::go("Resource/AutoGroup/50/Inventory"))
            .await
            .expect("loaded");
        let detail = state.detail.expect("detail");
        assert_eq!(detail.target.entity, DetailEntity::AutoGroup(GroupId(50)));
        assert!(matches!(detail.entity, LoadedEntity::Group(_)));
        assert!(inventory.recent.lock().expect("recent").is_empty());

        let visible = views
            .navigate(&NavigationRequest::go("ResourceGroup/50"))
            .await
            .expect("redirected");
        assert_eq!(visible.route, Some(Route::Inventory));
    }

    #[tokio::test]
    async fn empty_path_goes_to_default_and_admin_needs_permission() {
        let sink = Arc::new(MessageCenter::default());
        let mut views = controller(Arc::new(inventory()), sink);

        let state = views.navigate(&NavigationRequest::go("")).await.expect("default");
        assert_eq!(state.route, Some(Route::Dashboards));

        let err = views
            .navigate(&NavigationRequest::go(AdminPage::SystemSettings.path()))
            .await
            .expect_err("forbidden");
        assert_eq!(err.kind, ErrorKind::Forbidden);
    }

    #[tokio::test]
    async fn queued_requests_coalesce_to_newest() {
        let entered = Arc::new(Notify::new());
        let release = Arc::new(Notify::new());
        let mut inventory = inventory();
        inventory.gate = Some((entered.clone(), release.clone()));
        let inventory = Arc::new(inventory);
        let sink = Arc::new(MessageCenter::default());
        let (handle, _task) = ViewStateHandle::spawn(controller(inventory.clone(), sink));

        handle.navigate(NavigationRequest::go("Resource/10")).await.expect("send");
        entered.notified().await;

        for id in [11, 12, 13] {
            handle
                .navigate(NavigationRequest::go(format!("Resource/{id}")))
                .await
                .expect("send");
        }
        release.notify_one();
        entered.notified().await;
        release.notify_one();

        let state = handle.wait_for_generation(2).await.expect("state");
        assert_eq!(state.generation, 2);
        assert_eq!(state.path, "Resource/13");
        assert_eq!(handle.current().generation, 2);
        assert_eq!(*inventory.loads.lock().expect("loads"), vec![ResourceId(10), ResourceId(13)]);
    }

    #[tokio::test]
    async fn failed_requests_publish_an_error_state() {
        let sink = Arc::new(MessageCenter::default());
        let (handle, _task) = ViewStateHandle::spawn(controller(Arc::new(inventory()), sink.clone()));

        handle
            .navigate(NavigationRequest::go("Resource/not-a-number"))
            .await
            .expect("send");
        let state = handle.wait_for_generation(1).await.expect("state");
        assert_eq!(state.error.as_deref(), Some("Invalid entity id in view path"));
        assert_eq!(sink.latest().map(|message| message.severity), Some(Severity::Error));
    }
}
