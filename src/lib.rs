pub mod algorithms;
#[cfg(feature = "api")]
pub mod api;
pub mod cluster;
pub mod config;
pub mod controller;
#[cfg(feature = "sqlx")]
pub mod db;
pub mod error;
pub mod icons;
pub mod invariants;
pub mod models;
pub mod navigation;
pub mod notify;
pub mod permissions;
pub mod reports;
pub mod settings;
pub mod store;
pub mod tree;
pub mod views;

pub mod prelude {
    #[cfg(feature = "api")]
    pub use crate::api::{ConsoleApp, routes};
    pub use crate::cluster::ClusterTreeBuilder;
    pub use crate::config::ConsoleConfig;
    pub use crate::controller::{
        DetailController, EntityLoader, NavigationRequest, PreferencesStore, ViewController,
        ViewStateHandle,
    };
    #[cfg(feature = "sqlx")]
    pub use crate::db::{PgInventory, create_inventory_tables};
    pub use crate::error::{ErrorKind, LibError, Result};
    pub use crate::icons::icon_for;
    pub use crate::models::{
        ClusterFlyweight, GroupId, NodeId, NodeKind, Resource, ResourceGroup, ResourceId,
        ResourceType, ResourceTypeId, TreeNode, TypeCatalog,
    };
    pub use crate::navigation::ViewPath;
    pub use crate::notify::{MessageCenter, NotificationSink, TracingSink};
    pub use crate::reports::{
        CriteriaExecutor, ReportContext, ReportFormat, ReportKind, ReportSource, start_report,
    };
    pub use crate::store::{InventoryData, InventoryStore, TreeSource};
    pub use crate::tree::{TreeBuild, TreeBuilder};
    pub use crate::views::Route;
}
