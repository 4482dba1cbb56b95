//! Reference resolution for imports.
//!
//! Maps location, label and currency descriptors to ids within one owner's
//! scope, creating missing entities from the descriptor defaults.

use std::sync::Arc;

use tracing::{debug, info};
use uuid::Uuid;

use crate::defaults::{CURRENCY_CODE_LEN, DEFAULT_CURRENCIES, NAME_MAX_LEN};
use crate::error::{Error, Result};
use crate::models::{
    ItemReferences, ReferenceDescriptor, ReferenceKind, ResolvedReference, ResolvedReferences,
};
use crate::traits::ReferenceRepository;

/// Get-or-create front end over a [`ReferenceRepository`].
#[derive(Clone)]
pub struct ReferenceResolver {
    repo: Arc<dyn ReferenceRepository>,
}

impl ReferenceResolver {
    pub fn new(repo: Arc<dyn ReferenceRepository>) -> Self {
        Self { repo }
    }

    /// Resolve one descriptor to an entity id, creating the entity if needed.
    ///
    /// Fails with `InvalidInput` when the natural key is blank or longer
    /// than its column allows.
    pub async fn resolve_or_create(
        &self,
        owner: Uuid,
        descriptor: &ReferenceDescriptor,
    ) -> Result<ResolvedReference> {
        validate_natural_key(descriptor)?;
        let resolved = self.repo.resolve_or_create(owner, descriptor).await?;
        if resolved.created {
            debug!(
                subsystem = "import",
                component = "resolver",
                op = "resolve_or_create",
                owner_id = %owner,
                reference_kind = %descriptor.kind(),
                natural_key = descriptor.natural_key(),
                "Created reference entity"
            );
        }
        Ok(resolved)
    }

    /// Resolve every descriptor extracted from one record.
    pub async fn resolve_all(
        &self,
        owner: Uuid,
        references: &ItemReferences,
    ) -> Result<ResolvedReferences> {
        let mut label_ids = Vec::with_capacity(references.labels.len());
        for label in &references.labels {
            let id = self.resolve_or_create(owner, label).await?.id;
            if !label_ids.contains(&id) {
                label_ids.push(id);
            }
        }
        Ok(ResolvedReferences {
            location_id: self.resolve_opt(owner, references.location.as_ref()).await?,
            label_ids,
            purchase_currency_id: self
                .resolve_opt(owner, references.purchase_currency.as_ref())
                .await?,
            sold_currency_id: self.resolve_opt(owner, references.sold_currency.as_ref()).await?,
            insured_currency_id: self
                .resolve_opt(owner, references.insured_currency.as_ref())
                .await?,
        })
    }

    async fn resolve_opt(
        &self,
        owner: Uuid,
        descriptor: Option<&ReferenceDescriptor>,
    ) -> Result<Option<Uuid>> {
        match descriptor {
            Some(d) => Ok(Some(self.resolve_or_create(owner, d).await?.id)),
            None => Ok(None),
        }
    }

    /// Ensure the standard currencies exist for `owner`.
    ///
    /// Returns the number of currencies created by this call.
    pub async fn init_default_currencies(&self, owner: Uuid) -> Result<usize> {
        let mut created = 0;
        for (code, name, symbol) in DEFAULT_CURRENCIES {
            let descriptor = ReferenceDescriptor::currency(
                code,
                Some((*name).to_string()),
                Some((*symbol).to_string()),
            );
            if self.resolve_or_create(owner, &descriptor).await?.created {
                created += 1;
            }
        }
        info!(
            subsystem = "import",
            component = "resolver",
            op = "init_default_currencies",
            owner_id = %owner,
            created,
            "Default currencies initialized"
        );
        Ok(created)
    }

    /// Delete a location, label or currency and clear references to it.
    pub async fn delete(&self, owner: Uuid, kind: ReferenceKind, id: Uuid) -> Result<()> {
        self.repo.delete(owner, kind, id).await?;
        info!(
            subsystem = "import",
            component = "resolver",
            op = "delete",
            owner_id = %owner,
            reference_kind = %kind,
            "Reference entity deleted"
        );
        Ok(())
    }
}

fn validate_natural_key(descriptor: &ReferenceDescriptor) -> Result<()> {
    let key = descriptor.natural_key();
    if key.trim().is_empty() {
        return Err(Error::InvalidInput(format!(
            "{} natural key must not be blank",
            descriptor.kind()
        )));
    }
    let len = key.chars().count();
    let too_long = match descriptor.kind() {
        ReferenceKind::Currency => len != CURRENCY_CODE_LEN,
        ReferenceKind::Location | ReferenceKind::Label => len > NAME_MAX_LEN,
    };
    if too_long {
        return Err(Error::InvalidInput(format!(
            "{} '{}' does not fit its column",
            descriptor.kind(),
            key
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use crate::uuid_utils::new_v7;

    fn resolver() -> (ReferenceResolver, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        (ReferenceResolver::new(store.clone()), store)
    }

    #[tokio::test]
    async fn test_resolve_is_idempotent() {
        let (resolver, store) = resolver();
        let owner = new_v7();
        let garage = ReferenceDescriptor::location("Garage");

        let first = resolver.resolve_or_create(owner, &garage).await.unwrap();
        let second = resolver.resolve_or_create(owner, &garage).await.unwrap();

        assert!(first.created);
        assert!(!second.created);
        assert_eq!(first.id, second.id);
        assert_eq!(store.list_locations(owner).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_defaults_ignored_on_hit() {
        let (resolver, store) = resolver();
        let owner = new_v7();
        resolver
            .resolve_or_create(owner, &ReferenceDescriptor::label("Tools", Some("#ff0000".into())))
            .await
            .unwrap();
        resolver
            .resolve_or_create(owner, &ReferenceDescriptor::label("Tools", Some("#00ff00".into())))
            .await
            .unwrap();

        let labels = store.list_labels(owner).await.unwrap();
        assert_eq!(labels.len(), 1);
        assert_eq!(labels[0].color, "#ff0000");
    }

    #[tokio::test]
    async fn test_scoped_per_owner() {
        let (resolver, _) = resolver();
        let garage = ReferenceDescriptor::location("Garage");
        let a = resolver.resolve_or_create(new_v7(), &garage).await.unwrap();
        let b = resolver.resolve_or_create(new_v7(), &garage).await.unwrap();
        assert_ne!(a.id, b.id);
    }

    #[tokio::test]
    async fn test_blank_key_rejected() {
        let (resolver, _) = resolver();
        let err = resolver
            .resolve_or_create(new_v7(), &ReferenceDescriptor::location("  "))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));

        let err = resolver
            .resolve_or_create(new_v7(), &ReferenceDescriptor::currency("EURO", None, None))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_init_default_currencies() {
        let (resolver, store) = resolver();
        let owner = new_v7();
        resolver
            .resolve_or_create(owner, &ReferenceDescriptor::currency("USD", None, None))
            .await
            .unwrap();

        assert_eq!(resolver.init_default_currencies(owner).await.unwrap(), 4);
        assert_eq!(resolver.init_default_currencies(owner).await.unwrap(), 0);

        let currencies = store.list_currencies(owner).await.unwrap();
        assert_eq!(currencies.len(), 5);
        let usd = currencies.iter().find(|c| c.code == "USD").unwrap();
        // pre-existing row keeps its own defaults
        assert_eq!(usd.name, "USD");
    }

    #[tokio::test]
    async fn test_resolve_all_dedupes_labels() {
        let (resolver, _) = resolver();
        let owner = new_v7();
        let refs = ItemReferences {
            location: Some(ReferenceDescriptor::location("Shed")),
            labels: vec![
                ReferenceDescriptor::label("A", None),
                ReferenceDescriptor::label("A", Some("#000000".into())),
            ],
            purchase_currency: Some(ReferenceDescriptor::currency("gbp", None, None)),
            ..Default::default()
        };
        let resolved = resolver.resolve_all(owner, &refs).await.unwrap();
        assert!(resolved.location_id.is_some());
        assert_eq!(resolved.label_ids.len(), 1);
        assert!(resolved.purchase_currency_id.is_some());
        assert_eq!(resolved.sold_currency_id, None);
    }
}
