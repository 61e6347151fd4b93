use std::path::Path;

use tracing::{info, info_span};
use uuid::Uuid;
use vcloud_config::OperationClass;
use vcloud_core::{CatalogItemKind, LinkRel};

use super::{Cloud, CloudTransaction, transaction_failed};
use crate::Result;
use crate::remote::require_link;
use crate::state::{CATALOG_ITEM, VAPP_TEMPLATE};
use crate::steps::{
    AddCatalogItem, CreateTemplate, StemcellInfo, Target, UploadTemplateFiles, WaitTasks,
};
use crate::traits::{ClientFactory, IsoImageBuilder, VcdClient};

impl<F, I> Cloud<F, I>
where
    F: ClientFactory,
    I: IsoImageBuilder,
{
    /// Upload an unpacked stemcell image as a catalog template.
    ///
    /// Returns the URN of the new catalog item.
    ///
    /// # Errors
    ///
    /// Returns the error of the failing step after every completed step has
    /// been rolled back.
    pub fn create_stemcell(&self, image_dir: &Path) -> Result<String> {
        let _span = info_span!("create_stemcell", image = %image_dir.display()).entered();
        let ctx = self.context()?;
        let name = format!("sc-{}", Uuid::new_v4());

        let state = CloudTransaction::perform("create_stemcell", &ctx, |tx| {
            tx.next(StemcellInfo::new(image_dir))?;
            tx.next(CreateTemplate::new(&name))?;
            tx.next(UploadTemplateFiles::new())?;
            tx.next(WaitTasks::new(Target::Template, OperationClass::Default))?;
            tx.next(AddCatalogItem::new(CatalogItemKind::VAppTemplate))
        })
        .map_err(|err| transaction_failed("create_stemcell", err))?;

        let item = state.require(CATALOG_ITEM)?;
        info!(template = %name, urn = %item.urn, "created stemcell");
        Ok(item.urn.clone())
    }

    /// Delete a stemcell's template and catalog item.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the catalog item does not exist, or the error of
    /// a failed deletion.
    pub fn delete_stemcell(&self, stemcell_id: &str) -> Result<()> {
        let _span = info_span!("delete_stemcell", stemcell_id).entered();
        let ctx = self.context()?;

        CloudTransaction::perform("delete_stemcell", &ctx, |tx| {
            let client = tx.context().client();
            let item = client.resolve_catalog_item(stemcell_id)?;
            let template = client.template_of(&item)?;
            tx.state_mut().insert(VAPP_TEMPLATE, template);

            tx.next(
                WaitTasks::new(Target::Template, OperationClass::DeleteVAppTemplate)
                    .accept_failures(),
            )?;

            let template = tx.state().require(VAPP_TEMPLATE)?;
            client.delete(&require_link(template, LinkRel::Remove)?)?;
            client.delete(&require_link(&item, LinkRel::Remove)?)?;
            info!(stemcell_id, template = %template.name, "deleted stemcell");
            Ok(())
        })
        .map_err(|err| transaction_failed("delete_stemcell", err))?;
        Ok(())
    }
}
