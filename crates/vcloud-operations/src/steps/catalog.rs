use std::marker::PhantomData;

use tracing::{debug, info};
use vcloud_core::{CatalogItemKind, LinkRel, Resource};
use vcloud_saga::{StateBag, Step};

use crate::context::CloudContext;
use crate::error::CloudError;
use crate::remote::require_link;
use crate::state::{CATALOG_ITEM, MEDIA, VAPP_TEMPLATE};
use crate::traits::{IsoImageBuilder, VcdClient};

/// Publish the template or media stored by an earlier step in its catalog.
///
/// Templates go to `entities.vapp_catalog`, media to `entities.media_catalog`.
pub struct AddCatalogItem<C, I> {
    kind: CatalogItemKind,
    _marker: PhantomData<(C, I)>,
}

impl<C, I> AddCatalogItem<C, I> {
    #[must_use]
    pub fn new(kind: CatalogItemKind) -> Self {
        Self {
            kind,
            _marker: PhantomData,
        }
    }
}

impl<C, I> Step for AddCatalogItem<C, I>
where
    C: VcdClient,
    I: IsoImageBuilder,
{
    type Context = CloudContext<C, I>;
    type Error = CloudError;

    fn name(&self) -> &'static str {
        "add_catalog_item"
    }

    fn requires(&self) -> Vec<&'static str> {
        match self.kind {
            CatalogItemKind::VAppTemplate => vec![VAPP_TEMPLATE.name()],
            CatalogItemKind::Media => vec![MEDIA.name()],
        }
    }

    fn perform(&self, ctx: &Self::Context, state: &mut StateBag) -> Result<(), Self::Error> {
        let entities = ctx.entities();
        let (catalog, name, href) = match self.kind {
            CatalogItemKind::VAppTemplate => {
                let template = state.require(VAPP_TEMPLATE)?;
                (&entities.vapp_catalog, template.name.clone(), template.href.clone())
            }
            CatalogItemKind::Media => {
                let media = state.require(MEDIA)?;
                (&entities.media_catalog, media.name.clone(), media.href.clone())
            }
        };

        let item = ctx.client().add_catalog_item(catalog, &name, &href, self.kind)?;
        info!(catalog, item = %item.name, urn = %item.urn, "added catalog item");
        state.insert(CATALOG_ITEM, item);
        Ok(())
    }

    fn rollback(&self, ctx: &Self::Context, state: &mut StateBag) -> Result<(), Self::Error> {
        let Some(item) = state.get(CATALOG_ITEM) else {
            return Ok(());
        };
        let result = require_link(item, LinkRel::Remove).and_then(|link| ctx.client().delete(&link));
        match result {
            Ok(_) => {
                debug!(item = %item.name(), "removed catalog item");
                Ok(())
            }
            Err(err) if err.is_not_found() => Ok(()),
            Err(err) => Err(err),
        }
    }

    fn rollback_description(&self) -> String {
        "remove catalog item".to_string()
    }
}
