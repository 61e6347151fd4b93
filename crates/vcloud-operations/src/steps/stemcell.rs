use std::ffi::OsStr;
use std::fs;
use std::marker::PhantomData;
use std::path::PathBuf;

use tracing::{debug, info, warn};
use vcloud_config::OperationClass;
use vcloud_core::{Link, LinkRel, Resource, TemplateFile, UploadTemplateParams, VAppTemplate};
use vcloud_saga::{StateBag, Step, retry_operation};

use crate::context::CloudContext;
use crate::error::CloudError;
use crate::remote::delete_and_wait;
use crate::state::{STEMCELL_DIR, STEMCELL_OVF, VAPP_TEMPLATE};
use crate::traits::{IsoImageBuilder, VcdClient};

/// Locate the OVF descriptor of an unpacked stemcell image.
pub struct StemcellInfo<C, I> {
    image_dir: PathBuf,
    _marker: PhantomData<(C, I)>,
}

impl<C, I> StemcellInfo<C, I> {
    #[must_use]
    pub fn new(image_dir: impl Into<PathBuf>) -> Self {
        Self {
            image_dir: image_dir.into(),
            _marker: PhantomData,
        }
    }

    fn invalid(&self, reason: impl Into<String>) -> CloudError {
        CloudError::InvalidStemcell {
            path: self.image_dir.clone(),
            reason: reason.into(),
        }
    }
}

impl<C, I> Step for StemcellInfo<C, I>
where
    C: VcdClient,
    I: IsoImageBuilder,
{
    type Context = CloudContext<C, I>;
    type Error = CloudError;

    fn name(&self) -> &'static str {
        "stemcell_info"
    }

    fn perform(&self, _ctx: &Self::Context, state: &mut StateBag) -> Result<(), Self::Error> {
        if !self.image_dir.is_dir() {
            return Err(self.invalid("not a directory"));
        }

        let mut descriptors = Vec::new();
        for entry in fs::read_dir(&self.image_dir)? {
            let path = entry?.path();
            if path.extension() == Some(OsStr::new("ovf")) {
                if let Some(name) = path.file_name().and_then(OsStr::to_str) {
                    descriptors.push(name.to_string());
                }
            }
        }

        let ovf = match descriptors.as_slice() {
            [ovf] => ovf.clone(),
            [] => return Err(self.invalid("no OVF descriptor found")),
            _ => {
                return Err(self.invalid(format!(
                    "expected one OVF descriptor, found {}",
                    descriptors.len()
                )));
            }
        };

        debug!(dir = %self.image_dir.display(), ovf, "found stemcell descriptor");
        state.insert(STEMCELL_DIR, self.image_dir.clone());
        state.insert(STEMCELL_OVF, ovf);
        Ok(())
    }
}

/// Create the empty template the stemcell files are uploaded into.
pub struct CreateTemplate<C, I> {
    name: String,
    _marker: PhantomData<(C, I)>,
}

impl<C, I> CreateTemplate<C, I> {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            _marker: PhantomData,
        }
    }
}

impl<C, I> CreateTemplate<C, I>
where
    C: VcdClient,
    I: IsoImageBuilder,
{
    fn remove(ctx: &CloudContext<C, I>, template: &VAppTemplate) -> crate::Result<()> {
        let mut template = template.clone();
        if let Some(cancel) = template.link(LinkRel::Cancel).cloned() {
            debug!(template = %template.name, "cancelling upload");
            ctx.client().post(&cancel)?;
            template = ctx.client().reload_template(&template)?;
        }
        if let Some(remove) = template.link(LinkRel::Remove).cloned() {
            delete_and_wait(ctx, &remove, OperationClass::DeleteVAppTemplate)?;
            info!(template = %template.name, "deleted template");
        }
        Ok(())
    }
}

impl<C, I> Step for CreateTemplate<C, I>
where
    C: VcdClient,
    I: IsoImageBuilder,
{
    type Context = CloudContext<C, I>;
    type Error = CloudError;

    fn name(&self) -> &'static str {
        "create_template"
    }

    fn perform(&self, ctx: &Self::Context, state: &mut StateBag) -> Result<(), Self::Error> {
        let vdc = ctx.client().vdc()?;
        let storage_profile = ctx
            .entities()
            .vapp_storage_profile
            .as_deref()
            .and_then(|profile| {
                let found = vdc.storage_profile(profile);
                if found.is_none() {
                    warn!(profile, vdc = %vdc.name, "storage profile not found, using default");
                }
                found
            })
            .cloned();

        let params = UploadTemplateParams {
            name: self.name.clone(),
            description: ctx.entities().description.clone(),
            storage_profile,
        };
        let template = ctx.client().create_upload_template(&vdc, &params)?;
        info!(template = %template.name, urn = %template.urn, "created upload template");
        state.insert(VAPP_TEMPLATE, template);
        Ok(())
    }

    fn rollback(&self, ctx: &Self::Context, state: &mut StateBag) -> Result<(), Self::Error> {
        let Some(template) = state.get(VAPP_TEMPLATE) else {
            return Ok(());
        };
        match Self::remove(ctx, template) {
            Err(err) if err.is_not_found() => {
                debug!(template = %self.name, "template already gone");
                Ok(())
            }
            result => result,
        }
    }

    fn rollback_description(&self) -> String {
        format!("cancel and delete template '{}'", self.name)
    }
}

/// Upload the OVF descriptor, wait for the platform to process it, then
/// upload every file the template still lacks.
pub struct UploadTemplateFiles<C, I> {
    _marker: PhantomData<(C, I)>,
}

impl<C, I> UploadTemplateFiles<C, I> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<C, I> Default for UploadTemplateFiles<C, I> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C, I> Step for UploadTemplateFiles<C, I>
where
    C: VcdClient,
    I: IsoImageBuilder,
{
    type Context = CloudContext<C, I>;
    type Error = CloudError;

    fn name(&self) -> &'static str {
        "upload_template_files"
    }

    fn requires(&self) -> Vec<&'static str> {
        vec![
            VAPP_TEMPLATE.name(),
            STEMCELL_DIR.name(),
            STEMCELL_OVF.name(),
        ]
    }

    fn perform(&self, ctx: &Self::Context, state: &mut StateBag) -> Result<(), Self::Error> {
        let dir = state.require(STEMCELL_DIR)?.clone();
        let ovf = state.require(STEMCELL_OVF)?.clone();
        let template = ctx.client().reload_template(state.require(VAPP_TEMPLATE)?)?;
        let policy = ctx.control().upload_retry_policy();

        // A fresh upload template lists only its descriptor, which the
        // platform may name differently from the local file.
        let descriptor = template
            .files
            .iter()
            .find(|file| file.name == ovf)
            .or(match template.files.as_slice() {
                [only] => Some(only),
                _ => None,
            })
            .ok_or_else(|| CloudError::MissingLink {
                entity: ovf.clone(),
                rel: LinkRel::Upload,
            })?;
        let descriptor_name = descriptor.name.clone();
        let descriptor = require_file_link(descriptor)?;
        let ovf_path = dir.join(&ovf);
        let ovf_size = fs::metadata(&ovf_path)?.len();
        retry_operation(&format!("upload {ovf}"), &policy, |_| {
            ctx.client().upload_file(&descriptor, &ovf_path, ovf_size)
        })?;
        debug!(template = %template.name, ovf, "uploaded descriptor");

        let template = ctx.waiter().poll_until(
            &format!("descriptor of '{}'", template.name),
            OperationClass::ProcessDescriptorVAppTemplate,
            || {
                let current = ctx.client().reload_template(&template)?;
                let processed = current.files.iter().any(|file| file.name != descriptor_name);
                Ok(processed.then_some(current))
            },
        )?;

        for file in template.incomplete_files() {
            let link = require_file_link(file)?;
            let path = dir.join(&file.name);
            retry_operation(&format!("upload {}", file.name), &policy, |_| {
                ctx.client().upload_file(&link, &path, file.size)
            })?;
            info!(template = %template.name, file = %file.name, size = file.size, "uploaded file");
        }

        let template = ctx.client().reload_template(&template)?;
        state.insert(VAPP_TEMPLATE, template);
        Ok(())
    }
}

fn require_file_link(file: &TemplateFile) -> crate::Result<Link> {
    file.upload_link
        .clone()
        .ok_or_else(|| CloudError::MissingLink {
            entity: file.name.clone(),
            rel: LinkRel::Upload,
        })
}
