//! # Draft Listing FSM
//!
//! One draft per user, persisted across turns. States: DRAFT (accepting
//! attributes) → PREVIEW (awaiting confirmation) → PUBLISHED / CANCELLED.
//! Terminal drafts are deleted from storage; the state machine never
//! resurrects them.

use std::sync::Arc;

use chrono::Utc;
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::category::{listing_type, resolve_category};
use crate::error::{GatewayError, Result};
use crate::extract::extract_attributes;
use crate::models::{Draft, DraftState, Intent, Listing, TurnContext};
use crate::traits::{ListingsRepo, Store};

/// Fields a draft must carry before it can be previewed or published.
pub const REQUIRED_FIELDS: [&str; 3] = ["title", "price", "category"];

/// What one FSM step produced; the controller renders each variant into a
/// Turkish reply.
#[derive(Debug)]
pub enum StepOutcome {
    /// Draft persisted in DRAFT state; `missing` names the required fields
    /// still absent (empty only transiently).
    Updated { draft: Draft, missing: Vec<&'static str> },
    /// All required fields present; draft persisted in PREVIEW state.
    Preview { draft: Draft },
    /// Listing written; draft removed.
    Published {
        listing_id: Uuid,
        title: String,
        price: i64,
        location: String,
    },
    /// The listings writer failed; draft stays in PREVIEW.
    PublishFailed { error: GatewayError },
    /// Confirmation arrived with nothing to publish.
    NoDraft,
    /// Draft discarded.
    Cancelled,
    /// Nothing for the FSM to do; the controller forwards the turn to the
    /// agent backend (e.g. deleting or updating an already-published
    /// listing).
    Forward,
}

pub struct DraftFsm {
    store: Arc<dyn Store>,
    listings: Arc<dyn ListingsRepo>,
}

impl DraftFsm {
    pub fn new(store: Arc<dyn Store>, listings: Arc<dyn ListingsRepo>) -> Self {
        DraftFsm { store, listings }
    }

    pub async fn has_active_draft(&self, user_id: Uuid) -> Result<bool> {
        Ok(self.store.get_draft(user_id).await?.is_some())
    }

    /// Advance the per-user draft for one listing-adjacent turn.
    pub async fn step(
        &self,
        intent: Intent,
        ctx: &TurnContext,
        text: &str,
        image_refs: &[String],
        vision_product: Option<Value>,
    ) -> Result<StepOutcome> {
        match intent {
            Intent::CreateListing | Intent::UpdateListing => {
                self.merge_turn(intent, ctx, text, image_refs, vision_product)
                    .await
            }
            Intent::PublishListing => self.publish(ctx).await,
            Intent::DeleteListing => {
                if self.store.get_draft(ctx.user_id).await?.is_some() {
                    self.store.delete_draft(ctx.user_id).await?;
                    Ok(StepOutcome::Cancelled)
                } else {
                    // Deleting a published listing is a conversation with
                    // the agent backend, not a draft transition.
                    Ok(StepOutcome::Forward)
                }
            }
            _ => Ok(StepOutcome::Forward),
        }
    }

    /// `cancel` intent or cancel keyword with an active draft.
    pub async fn cancel_active(&self, user_id: Uuid) -> Result<bool> {
        if self.store.get_draft(user_id).await?.is_some() {
            self.store.delete_draft(user_id).await?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    /// Session ended (timeout, cancel, completion): the draft goes silently.
    pub async fn discard_on_session_end(&self, user_id: Uuid) -> Result<()> {
        self.store.delete_draft(user_id).await
    }

    async fn merge_turn(
        &self,
        intent: Intent,
        ctx: &TurnContext,
        text: &str,
        image_refs: &[String],
        vision_product: Option<Value>,
    ) -> Result<StepOutcome> {
        let existing = self.store.get_draft(ctx.user_id).await?;
        if existing.is_none() && intent == Intent::UpdateListing {
            // No draft to edit; the user means one of their published
            // listings.
            return Ok(StepOutcome::Forward);
        }

        let now = Utc::now();
        let mut draft = existing.unwrap_or_else(|| Draft {
            user_id: ctx.user_id,
            state: DraftState::Draft,
            listing_data: Value::Object(Map::new()),
            images: Vec::new(),
            vision_product: None,
            created_at: now,
            updated_at: now,
        });

        // Editing from PREVIEW reopens the draft.
        draft.state = DraftState::Draft;
        merge_attributes(&mut draft.listing_data, extract_attributes(text));
        apply_defaults(&mut draft.listing_data);

        for image in image_refs {
            if !draft.images.contains(image) {
                draft.images.push(image.clone());
            }
        }
        if vision_product.is_some() {
            draft.vision_product = vision_product;
        }
        draft.updated_at = now;

        // Category can usually be inferred once a title exists.
        fill_category(&mut draft.listing_data);

        let missing = missing_fields(&draft.listing_data);
        if missing.is_empty() {
            draft.state = DraftState::Preview;
            self.store.upsert_draft(&draft).await?;
            Ok(StepOutcome::Preview { draft })
        } else {
            self.store.upsert_draft(&draft).await?;
            Ok(StepOutcome::Updated { draft, missing })
        }
    }

    async fn publish(&self, ctx: &TurnContext) -> Result<StepOutcome> {
        let Some(mut draft) = self.store.get_draft(ctx.user_id).await? else {
            return Ok(StepOutcome::NoDraft);
        };

        let missing = missing_fields(&draft.listing_data);
        if !missing.is_empty() {
            // Not publishable yet; stay in DRAFT and ask for the specifics.
            return Ok(StepOutcome::Updated { draft, missing });
        }

        let listing = build_listing(ctx.user_id, &draft);
        match self.listings.insert_listing(&listing).await {
            Ok(listing_id) => {
                self.store.delete_draft(ctx.user_id).await?;
                Ok(StepOutcome::Published {
                    listing_id,
                    title: listing.title,
                    price: listing.price,
                    location: listing.location,
                })
            }
            Err(
                error @ (GatewayError::IntegrityViolation(_)
                | GatewayError::Validation(_)
                | GatewayError::StoreUnavailable(_)),
            ) => {
                // The draft survives the failure so the user can retry.
                if draft.state != DraftState::Preview {
                    draft.state = DraftState::Preview;
                    draft.updated_at = Utc::now();
                    self.store.upsert_draft(&draft).await?;
                }
                Ok(StepOutcome::PublishFailed { error })
            }
            Err(other) => Err(other),
        }
    }
}

fn merge_attributes(listing_data: &mut Value, incoming: Map<String, Value>) {
    if let Value::Object(bag) = listing_data {
        for (key, value) in incoming {
            bag.insert(key, value);
        }
    } else {
        *listing_data = Value::Object(incoming);
    }
}

fn apply_defaults(listing_data: &mut Value) {
    let Some(bag) = listing_data.as_object_mut() else {
        return;
    };
    bag.entry("location".to_string())
        .or_insert_with(|| Value::from("Türkiye"));
    bag.entry("stock".to_string()).or_insert_with(|| Value::from(1));
}

fn fill_category(listing_data: &mut Value) {
    let Some(bag) = listing_data.as_object_mut() else {
        return;
    };
    if bag.get("category").and_then(Value::as_str).is_some() {
        return;
    }
    let Some(title) = bag.get("title").and_then(Value::as_str) else {
        return;
    };
    let description = bag.get("description").and_then(Value::as_str);
    let (category, _) = resolve_category(None, title, description);
    if category != crate::category::DEFAULT_CATEGORY || bag.contains_key("price") {
        // Generic fallback only once the draft is otherwise shaping up;
        // an early "Genel" would mask the inference on later turns.
        bag.insert("category".to_string(), Value::from(category));
    }
}

fn missing_fields(listing_data: &Value) -> Vec<&'static str> {
    let bag = match listing_data.as_object() {
        Some(bag) => bag,
        None => return REQUIRED_FIELDS.to_vec(),
    };
    REQUIRED_FIELDS
        .iter()
        .copied()
        .filter(|field| match *field {
            "price" => bag.get("price").and_then(Value::as_i64).is_none(),
            other => bag
                .get(other)
                .and_then(Value::as_str)
                .map_or(true, |s| s.trim().is_empty()),
        })
        .collect()
}

fn build_listing(user_id: Uuid, draft: &Draft) -> Listing {
    let bag = draft
        .listing_data
        .as_object()
        .cloned()
        .unwrap_or_default();
    let get_str = |key: &str| bag.get(key).and_then(Value::as_str).map(str::to_string);

    let title = get_str("title").unwrap_or_default();
    let description = get_str("description");
    let (category, corrected_from) =
        resolve_category(get_str("category").as_deref(), &title, description.as_deref());

    let mut metadata = Map::new();
    metadata.insert("type".to_string(), Value::from(listing_type(&category)));
    if let Some(brand) = bag.get("brand").cloned() {
        metadata.insert("brand".to_string(), brand);
    }
    if let Some(model) = bag.get("model").cloned() {
        metadata.insert("model".to_string(), model);
    }
    if let Some(original) = corrected_from {
        metadata.insert("original_category".to_string(), Value::from(original));
        metadata.insert("category_corrected".to_string(), Value::from(true));
    }
    if let Some(vision) = &draft.vision_product {
        metadata.insert("vision_product".to_string(), vision.clone());
    }

    Listing {
        id: Uuid::now_v7(),
        user_id,
        title,
        price: bag.get("price").and_then(Value::as_i64).unwrap_or_default(),
        condition: get_str("condition"),
        category,
        description,
        location: get_str("location").unwrap_or_else(|| "Türkiye".to_string()),
        stock: bag.get("stock").and_then(Value::as_i64).unwrap_or(1),
        status: "active".to_string(),
        metadata: Value::Object(metadata),
        images: draft.images.clone(),
        created_at: Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_track_required_set() {
        let mut data = Value::Object(Map::new());
        assert_eq!(missing_fields(&data), vec!["title", "price", "category"]);

        merge_attributes(&mut data, extract_attributes("Marka: Toyota, Model: Corolla"));
        fill_category(&mut data);
        assert_eq!(missing_fields(&data), vec!["price"]);

        merge_attributes(&mut data, extract_attributes("Fiyat: 500.000 TL"));
        assert!(missing_fields(&data).is_empty());
    }

    #[test]
    fn defaults_fill_location_and_stock() {
        let mut data = Value::Object(Map::new());
        apply_defaults(&mut data);
        assert_eq!(data["location"], "Türkiye");
        assert_eq!(data["stock"], 1);
    }

    #[test]
    fn built_listing_carries_type_discriminator() {
        let mut data = Value::Object(Map::new());
        merge_attributes(
            &mut data,
            extract_attributes("Marka: Toyota, Model: Corolla, Fiyat: 500.000 TL"),
        );
        apply_defaults(&mut data);
        fill_category(&mut data);

        let now = Utc::now();
        let draft = Draft {
            user_id: Uuid::now_v7(),
            state: DraftState::Preview,
            listing_data: data,
            images: vec!["u/l/a.jpg".into()],
            vision_product: None,
            created_at: now,
            updated_at: now,
        };
        let listing = build_listing(draft.user_id, &draft);
        assert_eq!(listing.title, "Toyota Corolla");
        assert_eq!(listing.price, 500_000);
        assert_eq!(listing.category, "Otomotiv");
        assert_eq!(listing.metadata["type"], "vehicle");
        assert_eq!(listing.location, "Türkiye");
        assert_eq!(listing.stock, 1);
        assert_eq!(listing.images.len(), 1);
    }

    #[test]
    fn merge_overwrites_only_incoming_keys() {
        let mut data = Value::Object(Map::new());
        merge_attributes(&mut data, extract_attributes("Başlık: Eski Bisiklet, Fiyat: 3 bin TL"));
        merge_attributes(&mut data, extract_attributes("fiyatı 2500 yap"));
        assert_eq!(data["title"], "Eski Bisiklet");
        assert_eq!(data["price"], 2_500);
    }
}
