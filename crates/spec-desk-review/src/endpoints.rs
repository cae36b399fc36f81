// crates/spec-desk-review/src/endpoints.rs
// ============================================================================
// Module: Spec Desk Review Endpoints
// Description: Lane action endpoints for grid, component, and enum scopes.
// Purpose: Validate target kinds, compose transitions with propagation, refresh payloads.
// Dependencies: spec-desk-core, spec-desk-rules, spec-desk-store-sqlite, serde, thiserror
// ============================================================================

//! ## Overview
//! The review service is the endpoint layer of the state machine. Each write
//! endpoint validates its target kind, decides propagation from the rules
//! (authoritative component cascade, enum rename), runs the transactional
//! lane apply, and returns the post-write review row together with a
//! refreshed slice of the relevant payload. Errors are typed; the service
//! never absorbs one into the store.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;

use serde::Deserialize;
use serde::Serialize;
use spec_desk_core::Candidate;
use spec_desk_core::CandidateId;
use spec_desk_core::Category;
use spec_desk_core::ComponentIdentityId;
use spec_desk_core::ComponentIdentityRow;
use spec_desk_core::ComponentType;
use spec_desk_core::ComponentValueId;
use spec_desk_core::EnumListId;
use spec_desk_core::FieldKey;
use spec_desk_core::KeyReviewStateRow;
use spec_desk_core::Lane;
use spec_desk_core::LaneAction;
use spec_desk_core::LaneActionKind;
use spec_desk_core::ListValueId;
use spec_desk_core::ListValueRow;
use spec_desk_core::ProductId;
use spec_desk_core::PropertyKey;
use spec_desk_core::SlotRef;
use spec_desk_core::TargetKind;
use spec_desk_core::Timestamp;
use spec_desk_core::VariancePolicy;
use spec_desk_core::normalize_value;
use spec_desk_rules::RulesBundle;
use spec_desk_store_sqlite::Propagation;
use spec_desk_store_sqlite::SqliteSpecStore;
use spec_desk_store_sqlite::SqliteSpecStoreError;
use thiserror::Error;

use crate::payload::component::ComponentInputs;
use crate::payload::component::ComponentPayload;
use crate::payload::component::ComponentRowPayload;
use crate::payload::component::build_component_row;
use crate::payload::enum_list::EnumPayload;
use crate::payload::enum_list::EnumValueInputs;
use crate::payload::enum_list::EnumValuePayload;
use crate::payload::enum_list::build_enum_payload;
use crate::payload::grid::FieldState;
use crate::payload::grid::GridFieldInputs;
use crate::payload::grid::GridPayload;
use crate::payload::grid::build_field_state;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Stable code for a request missing a required slot id.
pub const CODE_MISSING_REQUIRED_ID: &str = "missing_required_id";

/// Review endpoint errors.
///
/// # Invariants
/// - `Validation` codes are stable wire labels (`lane_context_mismatch`,
///   `candidate_id_required`, `unknown_value_not_actionable`, ...).
#[derive(Debug, Error)]
pub enum ReviewApiError {
    /// Malformed or rejected request input.
    #[error("{code}: {message}")]
    Validation {
        /// Stable machine-readable code.
        code: &'static str,
        /// Human-readable description.
        message: String,
    },
    /// A requested slot, product, or component does not exist.
    #[error("not found: {0}")]
    NotFound(String),
    /// The relational store failed.
    #[error("store error: {0}")]
    Store(SqliteSpecStoreError),
}

impl ReviewApiError {
    /// Returns the HTTP status the API shell maps this error to.
    #[must_use]
    pub const fn http_status(&self) -> u16 {
        match self {
            Self::Validation {
                ..
            } => 400,
            Self::NotFound(_) => 404,
            Self::Store(_) => 500,
        }
    }

    /// Builds the target-kind mismatch rejection.
    #[must_use]
    fn lane_context_mismatch(expected: TargetKind, got: TargetKind) -> Self {
        Self::Validation {
            code: "lane_context_mismatch",
            message: format!("endpoint expects {}, slot is {}", expected.as_str(), got.as_str()),
        }
    }
}

impl From<SqliteSpecStoreError> for ReviewApiError {
    fn from(error: SqliteSpecStoreError) -> Self {
        match error {
            SqliteSpecStoreError::Rejected(kind) => Self::Validation {
                code: kind.code(),
                message: kind.to_string(),
            },
            SqliteSpecStoreError::NotFound(message) => Self::NotFound(message),
            other => Self::Store(other),
        }
    }
}

// ============================================================================
// SECTION: Requests and Responses
// ============================================================================

/// Grid endpoint request: a lane action on one item-field slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridReviewRequest {
    /// Lane the action targets.
    pub lane: Lane,
    /// Action kind.
    pub action: LaneActionKind,
    /// Selected value the action asserts.
    pub selected_value: String,
    /// Candidate the action is scoped to.
    pub candidate_id: Option<CandidateId>,
    /// Confirmation confidence (confirm only).
    pub confidence: Option<f64>,
    /// Action timestamp.
    pub at: Timestamp,
}

/// Component endpoint request: a shared-lane action on one property slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentReviewRequest {
    /// Action kind.
    pub action: LaneActionKind,
    /// Selected value the action asserts.
    pub selected_value: String,
    /// Candidate the action is scoped to.
    pub candidate_id: Option<CandidateId>,
    /// Confirmation confidence (confirm only).
    pub confidence: Option<f64>,
    /// Action timestamp.
    pub at: Timestamp,
}

/// Enum endpoint request: a shared-lane action, optionally renaming a member.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnumReviewRequest {
    /// Action kind.
    pub action: LaneActionKind,
    /// Member value before the action; defaults to the slot's current value.
    pub old_value: Option<String>,
    /// Member value the action asserts (rename target when it differs).
    pub new_value: String,
    /// Candidate the action is scoped to.
    pub candidate_id: Option<CandidateId>,
    /// Confirmation confidence (confirm only).
    pub confidence: Option<f64>,
    /// Action timestamp.
    pub at: Timestamp,
}

/// Refreshed payload slice returned by a write endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PayloadSlice {
    /// Refreshed grid field state.
    Grid {
        /// The field state after the write.
        field: FieldState,
    },
    /// Refreshed component row.
    Component {
        /// The component row after the write.
        component: ComponentRowPayload,
    },
    /// Refreshed enum member.
    Enum {
        /// The enum member after the write.
        value: EnumValuePayload,
    },
}

/// Write endpoint response: the post-write row and a refreshed slice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewResponse {
    /// Post-write review row, equal to the persisted row field-for-field.
    pub row: KeyReviewStateRow,
    /// Refreshed payload slice for the slot.
    pub slice: PayloadSlice,
}

// ============================================================================
// SECTION: Service
// ============================================================================

/// Review endpoint service over the store and one category's rules.
pub struct ReviewService<'a> {
    /// Relational store.
    store: &'a SqliteSpecStore,
    /// Category rules bundle.
    bundle: &'a RulesBundle,
}

impl<'a> ReviewService<'a> {
    /// Creates the service over a store and rules bundle.
    #[must_use]
    pub const fn new(store: &'a SqliteSpecStore, bundle: &'a RulesBundle) -> Self {
        Self {
            store,
            bundle,
        }
    }

    // ========================================================================
    // SECTION: Slot Resolution
    // ========================================================================

    /// Resolves the grid slot for an item field.
    ///
    /// # Errors
    ///
    /// Returns [`ReviewApiError::NotFound`] when the field state is absent.
    pub fn grid_slot(
        &self,
        category: &Category,
        product_id: &ProductId,
        field_key: &FieldKey,
    ) -> Result<SlotRef, ReviewApiError> {
        Ok(self.store.resolve_grid_slot(category, product_id, field_key)?)
    }

    /// Resolves the component slot for a property value row.
    ///
    /// # Errors
    ///
    /// Returns [`ReviewApiError::NotFound`] when either row is absent and a
    /// `lane_context_mismatch` validation error when the ids disagree.
    pub fn component_slot(
        &self,
        component_identity_id: ComponentIdentityId,
        component_value_id: ComponentValueId,
    ) -> Result<SlotRef, ReviewApiError> {
        let value = self
            .store
            .get_component_value_by_id(component_value_id)?
            .ok_or_else(|| {
                ReviewApiError::NotFound(format!("no component value {component_value_id}"))
            })?;
        if value.component_identity_id != component_identity_id {
            return Err(ReviewApiError::Validation {
                code: "lane_context_mismatch",
                message: "component value does not belong to the given identity".to_string(),
            });
        }
        let identity = self.component_identity(component_identity_id)?;
        Ok(SlotRef::ComponentKey {
            component_identity_id,
            component_value_id,
            component_identifier: component_identifier(&identity),
            property_key: value.property_key,
        })
    }

    /// Resolves the enum slot for a member row.
    ///
    /// # Errors
    ///
    /// Returns [`ReviewApiError::NotFound`] when the member is absent and a
    /// `lane_context_mismatch` validation error when the ids disagree.
    pub fn enum_slot(
        &self,
        list_value_id: ListValueId,
        enum_list_id: EnumListId,
    ) -> Result<SlotRef, ReviewApiError> {
        let row = self.list_value(list_value_id)?;
        if row.enum_list_id != enum_list_id {
            return Err(ReviewApiError::Validation {
                code: "lane_context_mismatch",
                message: "enum member does not belong to the given list".to_string(),
            });
        }
        Ok(SlotRef::EnumKey {
            list_value_id,
            enum_list_id,
            enum_value_norm: row.normalized_value,
        })
    }

    // ========================================================================
    // SECTION: Write Endpoints
    // ========================================================================

    /// Grid lane action: `user_accept` or `ai_confirm` on primary or shared.
    ///
    /// # Errors
    ///
    /// Returns [`ReviewApiError`] on target-kind mismatch, guard rejection,
    /// or store failure.
    pub fn grid_key_review(
        &self,
        category: &Category,
        slot: &SlotRef,
        request: &GridReviewRequest,
    ) -> Result<ReviewResponse, ReviewApiError> {
        let SlotRef::GridKey {
            item_field_state_id,
        } = slot
        else {
            return Err(ReviewApiError::lane_context_mismatch(
                TargetKind::GridKey,
                slot.target_kind(),
            ));
        };
        let state = self
            .store
            .get_item_field_state_by_id(*item_field_state_id)?
            .ok_or_else(|| {
                ReviewApiError::NotFound(format!("no item field state {item_field_state_id}"))
            })?;
        let candidates =
            self.store.candidates_for_field(category, &state.product_id, &state.field_key)?;
        let advance_ai_lane = self.lane_would_terminalize(
            category,
            slot,
            &candidates,
            request.candidate_id.as_ref(),
        )?;

        let action = LaneAction {
            lane: request.lane,
            kind: request.action,
            selected_value: request.selected_value.clone(),
            candidate_id: request.candidate_id.clone(),
            confidence: request.confidence,
            candidate_id_required: true,
            advance_ai_lane,
            at: request.at,
        };
        let row =
            self.store.apply_lane_state(category, slot, &action, &Propagation::GridSelection)?;

        let state = self
            .store
            .get_item_field_state_by_id(*item_field_state_id)?
            .ok_or_else(|| {
                ReviewApiError::NotFound(format!("no item field state {item_field_state_id}"))
            })?;
        let field = self.build_field_slice(category, &state.product_id, &state.field_key, &[])?;
        Ok(ReviewResponse {
            row,
            slice: PayloadSlice::Grid {
                field,
            },
        })
    }

    /// Component shared-lane action: override (`accept`) or confirm.
    ///
    /// Authoritative properties cascade their value to every linked item
    /// inside the same transaction.
    ///
    /// # Errors
    ///
    /// Returns [`ReviewApiError`] on target-kind mismatch, guard rejection,
    /// or store failure.
    pub fn component_review(
        &self,
        category: &Category,
        slot: &SlotRef,
        request: &ComponentReviewRequest,
    ) -> Result<ReviewResponse, ReviewApiError> {
        let SlotRef::ComponentKey {
            component_identity_id,
            component_value_id,
            property_key,
            ..
        } = slot
        else {
            return Err(ReviewApiError::lane_context_mismatch(
                TargetKind::ComponentKey,
                slot.target_kind(),
            ));
        };
        let value_row = self
            .store
            .get_component_value_by_id(*component_value_id)?
            .ok_or_else(|| {
                ReviewApiError::NotFound(format!("no component value {component_value_id}"))
            })?;

        let candidates =
            self.aggregate_property_candidates(category, *component_identity_id, property_key)?;
        let advance_ai_lane = self.lane_would_terminalize(
            category,
            slot,
            &candidates,
            request.candidate_id.as_ref(),
        )?;

        let effective_policy = value_row.variance_policy.or_else(|| {
            self.bundle
                .rules
                .get(&property_key.as_field_key())
                .and_then(|rule| rule.variance_policy)
        });
        let propagation = if effective_policy == Some(VariancePolicy::Authoritative) {
            Propagation::ComponentCascade {
                cross_rules: self.bundle.cross_validation.clone(),
            }
        } else {
            Propagation::None
        };

        let action = LaneAction {
            lane: Lane::Shared,
            kind: request.action,
            selected_value: request.selected_value.clone(),
            candidate_id: request.candidate_id.clone(),
            confidence: request.confidence,
            candidate_id_required: true,
            advance_ai_lane,
            at: request.at,
        };
        let row = self.store.apply_lane_state(category, slot, &action, &propagation)?;

        let component = self.build_component_slice(category, *component_identity_id)?;
        Ok(ReviewResponse {
            row,
            slice: PayloadSlice::Component {
                component,
            },
        })
    }

    /// Enum shared-lane action: accept (optionally renaming) or confirm.
    ///
    /// An accept whose new value differs from the member's current value
    /// rewrites every linked item value, rewires links, and replaces the
    /// member inside one transaction. Confirm is strictly slot-local.
    ///
    /// # Errors
    ///
    /// Returns [`ReviewApiError`] on target-kind mismatch, guard rejection,
    /// or store failure.
    pub fn enum_review(
        &self,
        category: &Category,
        slot: &SlotRef,
        request: &EnumReviewRequest,
    ) -> Result<ReviewResponse, ReviewApiError> {
        let SlotRef::EnumKey {
            list_value_id,
            enum_list_id,
            enum_value_norm,
        } = slot
        else {
            return Err(ReviewApiError::lane_context_mismatch(
                TargetKind::EnumKey,
                slot.target_kind(),
            ));
        };
        let member = self.list_value(*list_value_id)?;

        let old_value = request.old_value.clone().unwrap_or_else(|| member.value.clone());
        let renames = request.action == LaneActionKind::Accept
            && normalize_value(&old_value) != normalize_value(&request.new_value);
        let propagation = if renames {
            Propagation::EnumRename {
                new_value: request.new_value.clone(),
            }
        } else {
            Propagation::None
        };

        let candidates = self.aggregate_enum_candidates(
            category,
            *list_value_id,
            *enum_list_id,
            enum_value_norm,
        )?;
        let advance_ai_lane = self.lane_would_terminalize(
            category,
            slot,
            &candidates,
            request.candidate_id.as_ref(),
        )?;

        let action = LaneAction {
            lane: Lane::Shared,
            kind: request.action,
            selected_value: request.new_value.clone(),
            candidate_id: request.candidate_id.clone(),
            confidence: request.confidence,
            candidate_id_required: true,
            advance_ai_lane,
            at: request.at,
        };
        let row = self.store.apply_lane_state(category, slot, &action, &propagation)?;

        let SlotRef::EnumKey {
            list_value_id: final_value_id,
            ..
        } = &row.slot
        else {
            return Err(ReviewApiError::Store(SqliteSpecStoreError::Integrity(
                "enum action returned a non-enum slot".to_string(),
            )));
        };
        let value = self.build_enum_value_slice(category, *final_value_id)?;
        Ok(ReviewResponse {
            row,
            slice: PayloadSlice::Enum {
                value,
            },
        })
    }

    // ========================================================================
    // SECTION: Read Endpoints
    // ========================================================================

    /// Builds the grid payload for one product.
    ///
    /// # Errors
    ///
    /// Returns [`ReviewApiError`] on store failure.
    pub fn grid_payload(
        &self,
        category: &Category,
        product_id: &ProductId,
        fields_below_pass_target: &[FieldKey],
    ) -> Result<GridPayload, ReviewApiError> {
        let states = self.store.item_field_states_for_product(category, product_id)?;
        let mut fields = BTreeMap::new();
        for state in states {
            let field = self.build_field_slice(
                category,
                product_id,
                &state.field_key,
                fields_below_pass_target,
            )?;
            fields.insert(state.field_key.clone(), field);
        }
        Ok(GridPayload {
            product_id: product_id.clone(),
            fields,
        })
    }

    /// Builds the component payload for one component type.
    ///
    /// # Errors
    ///
    /// Returns [`ReviewApiError`] on store failure.
    pub fn component_payload(
        &self,
        category: &Category,
        component_type: &ComponentType,
    ) -> Result<ComponentPayload, ReviewApiError> {
        let identities = self.store.component_identities_for_type(category, component_type)?;
        let mut components = Vec::with_capacity(identities.len());
        for identity in identities {
            components.push(self.build_component_slice(category, identity.id)?);
        }
        Ok(ComponentPayload {
            component_type: component_type.clone(),
            components,
        })
    }

    /// Builds the enum payloads for every enum field of a category.
    ///
    /// # Errors
    ///
    /// Returns [`ReviewApiError`] on store failure.
    pub fn enum_payloads(&self, category: &Category) -> Result<Vec<EnumPayload>, ReviewApiError> {
        let lists = self.store.enum_lists_for_category(category)?;
        let mut payloads = Vec::with_capacity(lists.len());
        for list in lists {
            let members = self.store.list_values_for_list(list.id)?;
            let mut inputs = Vec::with_capacity(members.len());
            for member in &members {
                let links = self.store.links_for_list_value(member.id)?;
                let candidates = self.collect_enum_member_candidates(
                    category,
                    &list.field_key,
                    &member.normalized_value,
                    &links,
                )?;
                let review = self.store.get_key_review_state(
                    category,
                    &SlotRef::EnumKey {
                        list_value_id: member.id,
                        enum_list_id: list.id,
                        enum_value_norm: member.normalized_value.clone(),
                    },
                )?;
                inputs.push((member, links, candidates, review));
            }
            let member_inputs: Vec<EnumValueInputs<'_>> = inputs
                .iter()
                .map(|(member, links, candidates, review)| EnumValueInputs {
                    row: *member,
                    links: links.as_slice(),
                    candidates: candidates.clone(),
                    review: review.as_ref(),
                })
                .collect();
            payloads.push(build_enum_payload(list.field_key.clone(), &member_inputs));
        }
        Ok(payloads)
    }

    // ========================================================================
    // SECTION: Internal Helpers
    // ========================================================================

    /// Returns whether this confirm leaves no unreviewed candidate behind,
    /// advancing the AI lane to its terminal status.
    fn lane_would_terminalize(
        &self,
        category: &Category,
        slot: &SlotRef,
        candidates: &[Candidate],
        acting_candidate: Option<&CandidateId>,
    ) -> Result<bool, ReviewApiError> {
        let reviews = self.store.candidate_reviews_for_slot(
            category,
            slot.target_kind(),
            &slot.slot_key(),
        )?;
        let terminal: BTreeSet<&str> = reviews
            .iter()
            .filter(|review| review.decision.is_terminal())
            .map(|review| review.candidate_id.as_str())
            .collect();
        let unreviewed = candidates.iter().any(|candidate| {
            !terminal.contains(candidate.candidate_id.as_str())
                && Some(&candidate.candidate_id) != acting_candidate
        });
        Ok(!unreviewed)
    }

    /// Loads one component identity row or fails with not-found.
    fn component_identity(
        &self,
        id: ComponentIdentityId,
    ) -> Result<ComponentIdentityRow, ReviewApiError> {
        self.store
            .get_component_identity_by_id(id)?
            .ok_or_else(|| ReviewApiError::NotFound(format!("no component identity {id}")))
    }

    /// Loads one enum member row or fails with not-found.
    fn list_value(&self, id: ListValueId) -> Result<ListValueRow, ReviewApiError> {
        self.store
            .get_list_value_by_id(id)?
            .ok_or_else(|| ReviewApiError::NotFound(format!("no enum member {id}")))
    }

    /// Aggregates property candidates across every item linked to a component.
    fn aggregate_property_candidates(
        &self,
        category: &Category,
        component_identity_id: ComponentIdentityId,
        property_key: &PropertyKey,
    ) -> Result<Vec<Candidate>, ReviewApiError> {
        let links = self.store.links_for_component(component_identity_id)?;
        let field_key = property_key.as_field_key();
        let mut aggregated = Vec::new();
        for link in links {
            aggregated.extend(self.store.candidates_for_field(
                category,
                &link.product_id,
                &field_key,
            )?);
        }
        Ok(aggregated)
    }

    /// Aggregates candidates matching one enum member across its links.
    fn aggregate_enum_candidates(
        &self,
        category: &Category,
        list_value_id: ListValueId,
        enum_list_id: EnumListId,
        enum_value_norm: &str,
    ) -> Result<Vec<Candidate>, ReviewApiError> {
        let lists = self.store.enum_lists_for_category(category)?;
        let Some(list) = lists.iter().find(|list| list.id == enum_list_id) else {
            return Ok(Vec::new());
        };
        let links = self.store.links_for_list_value(list_value_id)?;
        self.collect_enum_member_candidates(category, &list.field_key, enum_value_norm, &links)
    }

    /// Collects the candidates of linked items whose normalized value matches
    /// the member.
    fn collect_enum_member_candidates(
        &self,
        category: &Category,
        field_key: &FieldKey,
        enum_value_norm: &str,
        links: &[spec_desk_core::ItemListLinkRow],
    ) -> Result<Vec<Candidate>, ReviewApiError> {
        let mut aggregated = Vec::new();
        for link in links {
            let candidates =
                self.store.candidates_for_field(category, &link.product_id, field_key)?;
            aggregated.extend(
                candidates
                    .into_iter()
                    .filter(|candidate| candidate.normalized_value == enum_value_norm),
            );
        }
        Ok(aggregated)
    }

    /// Rebuilds one grid field state from current rows.
    fn build_field_slice(
        &self,
        category: &Category,
        product_id: &ProductId,
        field_key: &FieldKey,
        fields_below_pass_target: &[FieldKey],
    ) -> Result<FieldState, ReviewApiError> {
        let state = self
            .store
            .get_item_field_state(category, product_id, field_key)?
            .ok_or_else(|| {
                ReviewApiError::NotFound(format!("no item field state {product_id}.{field_key}"))
            })?;
        let candidates = self.store.candidates_for_field(category, product_id, field_key)?;
        let review = self.store.get_key_review_state(
            category,
            &SlotRef::GridKey {
                item_field_state_id: state.id,
            },
        )?;
        Ok(build_field_state(&GridFieldInputs {
            state: &state,
            candidates: &candidates,
            review: review.as_ref(),
            below_pass_target: fields_below_pass_target.contains(field_key),
        }))
    }

    /// Rebuilds one component row payload from current rows.
    fn build_component_slice(
        &self,
        category: &Category,
        component_identity_id: ComponentIdentityId,
    ) -> Result<ComponentRowPayload, ReviewApiError> {
        let identity = self.component_identity(component_identity_id)?;
        let values = self.store.component_values_for_identity(component_identity_id)?;
        let links = self.store.links_for_component(component_identity_id)?;

        let mut name_candidates = Vec::new();
        for link in &links {
            name_candidates.extend(self.store.candidates_for_field(
                category,
                &link.product_id,
                &link.field_key,
            )?);
        }

        let mut property_candidates = BTreeMap::new();
        let mut item_property_values: BTreeMap<PropertyKey, Vec<(ProductId, String)>> =
            BTreeMap::new();
        let mut reviews = BTreeMap::new();
        for value_row in &values {
            property_candidates.insert(
                value_row.property_key.clone(),
                self.aggregate_property_candidates(
                    category,
                    component_identity_id,
                    &value_row.property_key,
                )?,
            );
            let field_key = value_row.property_key.as_field_key();
            let mut item_values = Vec::new();
            for link in &links {
                if let Some(state) =
                    self.store.get_item_field_state(category, &link.product_id, &field_key)?
                    && let Some(value) = state.value
                {
                    item_values.push((link.product_id.clone(), value));
                }
            }
            item_property_values.insert(value_row.property_key.clone(), item_values);

            let slot = SlotRef::ComponentKey {
                component_identity_id,
                component_value_id: value_row.id,
                component_identifier: component_identifier(&identity),
                property_key: value_row.property_key.clone(),
            };
            if let Some(review) = self.store.get_key_review_state(category, &slot)? {
                reviews.insert(value_row.property_key.clone(), review);
            }
        }

        Ok(build_component_row(&ComponentInputs {
            identity: &identity,
            values: &values,
            links: &links,
            name_candidates,
            property_candidates,
            item_property_values,
            reviews,
            rules: &self.bundle.rules,
            known_values: &self.bundle.known_values,
        }))
    }

    /// Rebuilds one enum member payload from current rows.
    fn build_enum_value_slice(
        &self,
        category: &Category,
        list_value_id: ListValueId,
    ) -> Result<EnumValuePayload, ReviewApiError> {
        let member = self.list_value(list_value_id)?;
        let lists = self.store.enum_lists_for_category(category)?;
        let field_key = lists
            .iter()
            .find(|list| list.id == member.enum_list_id)
            .map(|list| list.field_key.clone())
            .ok_or_else(|| {
                ReviewApiError::NotFound(format!("no enum list {}", member.enum_list_id))
            })?;
        let links = self.store.links_for_list_value(member.id)?;
        let candidates = self.collect_enum_member_candidates(
            category,
            &field_key,
            &member.normalized_value,
            &links,
        )?;
        let review = self.store.get_key_review_state(
            category,
            &SlotRef::EnumKey {
                list_value_id: member.id,
                enum_list_id: member.enum_list_id,
                enum_value_norm: member.normalized_value.clone(),
            },
        )?;
        let inputs = EnumValueInputs {
            row: &member,
            links: &links,
            candidates,
            review: review.as_ref(),
        };
        let payload = build_enum_payload(field_key, std::slice::from_ref(&inputs));
        payload.values.into_iter().next().ok_or_else(|| {
            ReviewApiError::NotFound(format!("enum member {list_value_id} is not visible"))
        })
    }
}

/// Formats the human-readable component identifier for a slot.
fn component_identifier(identity: &ComponentIdentityRow) -> String {
    format!("{} ({})", identity.canonical_name, identity.maker)
}
