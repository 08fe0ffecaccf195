use super::{required_link, wait_for_reply};
use crate::error::Result;
use crate::pipeline::Step;
use crate::state::StateBag;
use async_trait::async_trait;
use serde_json::json;
use vcloud_client::{
    CatalogType, Entity, InvokeOptions, Method, VCloudClient, media_type, rel,
};

/// Publish an uploaded item (media or vApp template) into a catalog
pub struct AddCatalogItem {
    catalog_type: CatalogType,
    item: Entity,
}

impl AddCatalogItem {
    pub const STATE_KEY: &'static str = "catalog_item";

    pub fn new(catalog_type: CatalogType, item: Entity) -> Self {
        Self { catalog_type, item }
    }
}

#[async_trait]
impl Step for AddCatalogItem {
    fn name(&self) -> &str {
        "AddCatalogItem"
    }

    async fn perform(&self, client: &VCloudClient, state: &mut StateBag) -> Result<()> {
        let catalog = client.catalog(self.catalog_type).await?;
        let link = required_link(&catalog, rel::ADD, media_type::CATALOG_ITEM, "add catalog item")?;

        let payload = json!({
            "name": self.item.name,
            "entity": self.item.to_link(),
        });
        let catalog_item = client
            .invoke(
                Method::POST,
                link,
                InvokeOptions::new().payload(payload, media_type::CATALOG_ITEM),
            )
            .await?
            .entity()?;

        tracing::info!(
            "Added {} to {} catalog as {}",
            self.item.describe(),
            self.catalog_type,
            catalog_item.href
        );
        state.insert(Self::STATE_KEY, &catalog_item)
    }

    async fn rollback(&self, client: &VCloudClient, state: &mut StateBag) -> Result<()> {
        let Some(catalog_item) = state.get::<Entity>(Self::STATE_KEY)? else {
            return Ok(());
        };

        let reply = client
            .invoke(Method::DELETE, &catalog_item, InvokeOptions::new())
            .await?;
        wait_for_reply(client, reply).await?;
        tracing::info!("Removed catalog item {}", catalog_item.describe());
        state.remove(Self::STATE_KEY);
        Ok(())
    }
}
