//! Staged workflow automaton for batches and shipments.
//!
//! Checkpoint definitions are configuration data owned by an external
//! collaborator and can change while aggregates already exist, so stage
//! instances are materialized lazily: [`WorkflowService::ensure_batch_instances`]
//! and [`WorkflowService::ensure_shipment_instances`] are idempotent and run
//! before every read or write of a workflow.
//!
//! Completing a stage validates, in order: the attachment requirement, then
//! every configured evidence field (supplied value first, value already
//! stored on the shipment as fallback). The phase gate then advances the
//! shipment's macro-status when every active stage of the phase is done,
//! and reopening a stage regresses it when a previously satisfied gate no
//! longer holds.

pub mod fields;

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::NaiveDate;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, Set,
};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::db::in_transaction;
use crate::entities::shipment::{self, ShipmentStatus};
use crate::entities::stage_definition::{self, WorkflowPhase};
use crate::entities::{batch_stage, shipment_stage, stage_requirement};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};

use self::fields::FieldValue;

/// Evidence supplied by the caller when completing a stage, keyed by the
/// configured field name.
pub type EvidenceMap = HashMap<String, FieldValue>;

/// Read access to checkpoint configuration.
#[derive(Clone)]
pub struct StageDefinitionRegistry {
    db: Arc<DatabaseConnection>,
}

impl StageDefinitionRegistry {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Active definitions of a phase, in checkpoint order.
    pub async fn active_definitions(
        &self,
        phase: WorkflowPhase,
    ) -> Result<Vec<stage_definition::Model>, ServiceError> {
        active_definitions(&*self.db, phase).await
    }

    /// Field names a definition requires as evidence.
    pub async fn required_fields(
        &self,
        stage_definition_id: Uuid,
    ) -> Result<Vec<String>, ServiceError> {
        required_fields(&*self.db, stage_definition_id).await
    }
}

/// One checkpoint of a batch workflow together with its definition.
#[derive(Debug, Clone)]
pub struct BatchStageView {
    pub definition: stage_definition::Model,
    pub stage: batch_stage::Model,
}

/// One checkpoint of a shipment workflow together with its definition.
#[derive(Debug, Clone)]
pub struct ShipmentStageView {
    pub definition: stage_definition::Model,
    pub stage: shipment_stage::Model,
}

/// Service driving stage instances and the phase gate.
#[derive(Clone)]
pub struct WorkflowService {
    db: Arc<DatabaseConnection>,
    event_sender: EventSender,
}

impl WorkflowService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: EventSender) -> Self {
        Self { db, event_sender }
    }

    /// Creates missing batch-phase stage instances for the batch. Safe to
    /// call any number of times.
    #[instrument(skip(self))]
    pub async fn ensure_batch_instances(&self, batch_id: Uuid) -> Result<(), ServiceError> {
        in_transaction(&self.db, |txn| {
            Box::pin(async move {
                let defs = active_definitions(txn, WorkflowPhase::Batch).await?;
                let existing: HashSet<Uuid> = batch_stage::Entity::find()
                    .filter(batch_stage::Column::BatchId.eq(batch_id))
                    .all(txn)
                    .await?
                    .into_iter()
                    .map(|s| s.stage_definition_id)
                    .collect();

                for def in defs {
                    if !existing.contains(&def.id) {
                        batch_stage::ActiveModel {
                            id: Set(Uuid::new_v4()),
                            batch_id: Set(batch_id),
                            stage_definition_id: Set(def.id),
                            active: Set(true),
                            ..Default::default()
                        }
                        .insert(txn)
                        .await?;
                    }
                }
                Ok(())
            })
        })
        .await
    }

    /// Creates missing shipment stage instances for one phase. Safe to call
    /// any number of times; `phase` must be `PreLoading` or `Shipment`.
    #[instrument(skip(self))]
    pub async fn ensure_shipment_instances(
        &self,
        shipment_id: Uuid,
        phase: WorkflowPhase,
    ) -> Result<(), ServiceError> {
        if phase == WorkflowPhase::Batch {
            return Err(ServiceError::ValidationError(
                "batch phase does not apply to shipments".to_string(),
            ));
        }
        in_transaction(&self.db, |txn| {
            Box::pin(async move {
                let defs = active_definitions(txn, phase).await?;
                let existing: HashSet<Uuid> = shipment_stage::Entity::find()
                    .filter(shipment_stage::Column::ShipmentId.eq(shipment_id))
                    .all(txn)
                    .await?
                    .into_iter()
                    .map(|s| s.stage_definition_id)
                    .collect();

                for def in defs {
                    if !existing.contains(&def.id) {
                        shipment_stage::ActiveModel {
                            id: Set(Uuid::new_v4()),
                            shipment_id: Set(shipment_id),
                            stage_definition_id: Set(def.id),
                            active: Set(true),
                            ..Default::default()
                        }
                        .insert(txn)
                        .await?;
                    }
                }
                Ok(())
            })
        })
        .await
    }

    /// The batch's checkpoints in order, materializing missing instances
    /// first.
    pub async fn batch_workflow(
        &self,
        batch_id: Uuid,
    ) -> Result<Vec<BatchStageView>, ServiceError> {
        self.ensure_batch_instances(batch_id).await?;
        let defs = active_definitions(&*self.db, WorkflowPhase::Batch).await?;
        let instances: HashMap<Uuid, batch_stage::Model> = batch_stage::Entity::find()
            .filter(batch_stage::Column::BatchId.eq(batch_id))
            .all(&*self.db)
            .await?
            .into_iter()
            .map(|s| (s.stage_definition_id, s))
            .collect();

        Ok(defs
            .into_iter()
            .filter_map(|definition| {
                instances.get(&definition.id).cloned().map(|stage| BatchStageView {
                    definition,
                    stage,
                })
            })
            .collect())
    }

    /// The shipment's checkpoints of one phase in order, materializing
    /// missing instances first.
    pub async fn shipment_workflow(
        &self,
        shipment_id: Uuid,
        phase: WorkflowPhase,
    ) -> Result<Vec<ShipmentStageView>, ServiceError> {
        self.ensure_shipment_instances(shipment_id, phase).await?;
        let defs = active_definitions(&*self.db, phase).await?;
        let instances: HashMap<Uuid, shipment_stage::Model> = shipment_stage::Entity::find()
            .filter(shipment_stage::Column::ShipmentId.eq(shipment_id))
            .all(&*self.db)
            .await?
            .into_iter()
            .map(|s| (s.stage_definition_id, s))
            .collect();

        Ok(defs
            .into_iter()
            .filter_map(|definition| {
                instances
                    .get(&definition.id)
                    .cloned()
                    .map(|stage| ShipmentStageView { definition, stage })
            })
            .collect())
    }

    /// Completes a batch checkpoint. Batches carry no evidence fields, so
    /// any configured field requirement on a batch-phase definition is
    /// unresolvable and fails the completion.
    #[instrument(skip(self, evidence))]
    pub async fn complete_batch_stage(
        &self,
        stage_instance_id: Uuid,
        actual_completion: NaiveDate,
        evidence: &EvidenceMap,
        attachment: Option<String>,
    ) -> Result<batch_stage::Model, ServiceError> {
        let evidence = evidence.clone();
        let updated = in_transaction(&self.db, |txn| {
            Box::pin(async move {
                let stage = batch_stage::Entity::find_by_id(stage_instance_id)
                    .one(txn)
                    .await?
                    .ok_or_else(|| ServiceError::not_found("batch stage", stage_instance_id))?;
                let def = definition_of(txn, stage.stage_definition_id).await?;

                let effective_attachment = attachment.clone().or_else(|| stage.attachment.clone());
                check_attachment(&def, attachment.is_some(), &effective_attachment)?;

                let requirements = required_fields(txn, def.id).await?;
                let missing: Vec<String> = requirements
                    .into_iter()
                    .filter(|name| {
                        !evidence
                            .get(name)
                            .map(FieldValue::is_present)
                            .unwrap_or(false)
                    })
                    .collect();
                if !missing.is_empty() {
                    return Err(ServiceError::MissingEvidence {
                        stage: def.name,
                        fields: missing,
                    });
                }

                let mut active: batch_stage::ActiveModel = stage.into();
                active.actual_completion = Set(Some(actual_completion));
                if attachment.is_some() {
                    active.attachment = Set(attachment);
                }
                let updated = active.update(txn).await?;
                Ok((updated, def.name))
            })
        })
        .await
        .map(|(stage, name)| {
            let event = Event::StageCompleted {
                stage_instance_id,
                stage_name: name,
                actual_completion,
            };
            (stage, event)
        })?;

        let (stage, event) = updated;
        self.event_sender.send_or_log(event).await;
        Ok(stage)
    }

    /// Reopens a batch checkpoint (clears its completion). Batches have no
    /// macro gate, so no status change follows.
    #[instrument(skip(self))]
    pub async fn reopen_batch_stage(
        &self,
        stage_instance_id: Uuid,
    ) -> Result<batch_stage::Model, ServiceError> {
        let conn = &*self.db;
        let stage = batch_stage::Entity::find_by_id(stage_instance_id)
            .one(conn)
            .await?
            .ok_or_else(|| ServiceError::not_found("batch stage", stage_instance_id))?;
        let def = definition_of(conn, stage.stage_definition_id).await?;

        let mut active: batch_stage::ActiveModel = stage.into();
        active.actual_completion = Set(None);
        let updated = active.update(conn).await?;

        self.event_sender
            .send_or_log(Event::StageReopened {
                stage_instance_id,
                stage_name: def.name,
            })
            .await;
        Ok(updated)
    }

    /// Sets the estimate and notes on a batch checkpoint.
    pub async fn schedule_batch_stage(
        &self,
        stage_instance_id: Uuid,
        estimated_completion: Option<NaiveDate>,
        notes: Option<String>,
    ) -> Result<batch_stage::Model, ServiceError> {
        let conn = &*self.db;
        let stage = batch_stage::Entity::find_by_id(stage_instance_id)
            .one(conn)
            .await?
            .ok_or_else(|| ServiceError::not_found("batch stage", stage_instance_id))?;
        let mut active: batch_stage::ActiveModel = stage.into();
        active.estimated_completion = Set(estimated_completion);
        if notes.is_some() {
            active.notes = Set(notes);
        }
        Ok(active.update(conn).await?)
    }

    /// Completes a shipment checkpoint.
    ///
    /// Validation order: attachment requirement, then every configured
    /// evidence field — the supplied map wins, the value already stored on
    /// the shipment is the fallback. On success the supplied evidence is
    /// persisted onto the shipment, the completion recorded, and the phase
    /// gate recomputed.
    #[instrument(skip(self, evidence))]
    pub async fn complete_shipment_stage(
        &self,
        stage_instance_id: Uuid,
        actual_completion: NaiveDate,
        evidence: &EvidenceMap,
        attachment: Option<String>,
    ) -> Result<shipment_stage::Model, ServiceError> {
        let evidence = evidence.clone();
        let (stage, def_name, transition) = in_transaction(&self.db, |txn| {
            Box::pin(async move {
                let stage = shipment_stage::Entity::find_by_id(stage_instance_id)
                    .one(txn)
                    .await?
                    .ok_or_else(|| ServiceError::not_found("shipment stage", stage_instance_id))?;
                let def = definition_of(txn, stage.stage_definition_id).await?;
                let parent = shipment::Entity::find_by_id(stage.shipment_id)
                    .one(txn)
                    .await?
                    .ok_or_else(|| ServiceError::not_found("shipment", stage.shipment_id))?;

                let effective_attachment = attachment.clone().or_else(|| stage.attachment.clone());
                check_attachment(&def, attachment.is_some(), &effective_attachment)?;

                let requirements = required_fields(txn, def.id).await?;
                let mut missing = Vec::new();
                let mut to_persist: Vec<(&'static fields::FieldAccessor, FieldValue)> = Vec::new();
                for name in &requirements {
                    let supplied = evidence.get(name).filter(|v| v.is_present()).cloned();
                    match (fields::accessor(name), supplied) {
                        (Some(acc), Some(value)) => to_persist.push((acc, value)),
                        (Some(acc), None) => {
                            if acc.get(&parent).is_none() {
                                missing.push(name.clone());
                            }
                        }
                        // Configuration names a field the engine does not
                        // know; it can never be satisfied.
                        (None, _) => missing.push(name.clone()),
                    }
                }
                if !missing.is_empty() {
                    return Err(ServiceError::MissingEvidence {
                        stage: def.name,
                        fields: missing,
                    });
                }

                let shipment_id = parent.id;
                if !to_persist.is_empty() {
                    let mut parent_active: shipment::ActiveModel = parent.into();
                    for (acc, value) in to_persist {
                        acc.set(&mut parent_active, value)?;
                    }
                    parent_active.update(txn).await?;
                }

                let mut active: shipment_stage::ActiveModel = stage.into();
                active.actual_completion = Set(Some(actual_completion));
                if attachment.is_some() {
                    active.attachment = Set(attachment);
                }
                let updated = active.update(txn).await?;

                let phase = def
                    .phase()
                    .ok_or_else(|| {
                        ServiceError::InternalError(format!(
                            "stage definition {} has unknown phase {}",
                            def.id, def.phase
                        ))
                    })?;
                let transition = advance_gate(txn, shipment_id, phase).await?;

                Ok((updated, def.name, transition))
            })
        })
        .await?;

        info!(stage = %def_name, %stage_instance_id, "shipment stage completed");
        self.event_sender
            .send_or_log(Event::StageCompleted {
                stage_instance_id,
                stage_name: def_name,
                actual_completion,
            })
            .await;
        if let Some((shipment_id, old, new)) = transition {
            self.event_sender
                .send_or_log(Event::ShipmentStatusChanged {
                    shipment_id,
                    old_status: old,
                    new_status: new,
                })
                .await;
        }
        Ok(stage)
    }

    /// Reopens a shipment checkpoint and regresses the macro-status when a
    /// previously satisfied gate no longer holds.
    #[instrument(skip(self))]
    pub async fn reopen_shipment_stage(
        &self,
        stage_instance_id: Uuid,
    ) -> Result<shipment_stage::Model, ServiceError> {
        let (stage, def_name, transition) = in_transaction(&self.db, |txn| {
            Box::pin(async move {
                let stage = shipment_stage::Entity::find_by_id(stage_instance_id)
                    .one(txn)
                    .await?
                    .ok_or_else(|| ServiceError::not_found("shipment stage", stage_instance_id))?;
                let def = definition_of(txn, stage.stage_definition_id).await?;
                let shipment_id = stage.shipment_id;

                let mut active: shipment_stage::ActiveModel = stage.into();
                active.actual_completion = Set(None);
                let updated = active.update(txn).await?;

                let phase = def.phase().ok_or_else(|| {
                    ServiceError::InternalError(format!(
                        "stage definition {} has unknown phase {}",
                        def.id, def.phase
                    ))
                })?;
                let transition = regress_gate(txn, shipment_id, phase).await?;
                Ok((updated, def.name, transition))
            })
        })
        .await?;

        self.event_sender
            .send_or_log(Event::StageReopened {
                stage_instance_id,
                stage_name: def_name,
            })
            .await;
        if let Some((shipment_id, old, new)) = transition {
            self.event_sender
                .send_or_log(Event::ShipmentStatusChanged {
                    shipment_id,
                    old_status: old,
                    new_status: new,
                })
                .await;
        }
        Ok(stage)
    }

    /// Sets the estimate and notes on a shipment checkpoint.
    pub async fn schedule_shipment_stage(
        &self,
        stage_instance_id: Uuid,
        estimated_completion: Option<NaiveDate>,
        notes: Option<String>,
    ) -> Result<shipment_stage::Model, ServiceError> {
        let conn = &*self.db;
        let stage = shipment_stage::Entity::find_by_id(stage_instance_id)
            .one(conn)
            .await?
            .ok_or_else(|| ServiceError::not_found("shipment stage", stage_instance_id))?;
        let mut active: shipment_stage::ActiveModel = stage.into();
        active.estimated_completion = Set(estimated_completion);
        if notes.is_some() {
            active.notes = Set(notes);
        }
        Ok(active.update(conn).await?)
    }
}

fn check_attachment(
    def: &stage_definition::Model,
    attachment_supplied: bool,
    effective_attachment: &Option<String>,
) -> Result<(), ServiceError> {
    if attachment_supplied && !def.allows_attachment {
        return Err(ServiceError::ValidationError(format!(
            "stage \"{}\" does not allow an attachment",
            def.name
        )));
    }
    if def.requires_attachment && effective_attachment.is_none() {
        return Err(ServiceError::MissingAttachment {
            stage: def.name.clone(),
        });
    }
    Ok(())
}

pub(crate) async fn active_definitions<C: ConnectionTrait>(
    conn: &C,
    phase: WorkflowPhase,
) -> Result<Vec<stage_definition::Model>, ServiceError> {
    Ok(stage_definition::Entity::find()
        .filter(stage_definition::Column::Phase.eq(phase.to_string()))
        .filter(stage_definition::Column::Active.eq(true))
        .order_by_asc(stage_definition::Column::SortOrder)
        .order_by_asc(stage_definition::Column::Name)
        .all(conn)
        .await?)
}

pub(crate) async fn required_fields<C: ConnectionTrait>(
    conn: &C,
    stage_definition_id: Uuid,
) -> Result<Vec<String>, ServiceError> {
    Ok(stage_requirement::Entity::find()
        .filter(stage_requirement::Column::StageDefinitionId.eq(stage_definition_id))
        .all(conn)
        .await?
        .into_iter()
        .map(|r| r.field_name)
        .collect())
}

async fn definition_of<C: ConnectionTrait>(
    conn: &C,
    stage_definition_id: Uuid,
) -> Result<stage_definition::Model, ServiceError> {
    stage_definition::Entity::find_by_id(stage_definition_id)
        .one(conn)
        .await?
        .ok_or_else(|| ServiceError::not_found("stage definition", stage_definition_id))
}

/// True when every active instance of the phase on the shipment is done.
async fn phase_complete<C: ConnectionTrait>(
    conn: &C,
    shipment_id: Uuid,
    phase: WorkflowPhase,
) -> Result<bool, ServiceError> {
    let defs = active_definitions(conn, phase).await?;
    let def_ids: HashSet<Uuid> = defs.iter().map(|d| d.id).collect();
    let instances = shipment_stage::Entity::find()
        .filter(shipment_stage::Column::ShipmentId.eq(shipment_id))
        .filter(shipment_stage::Column::Active.eq(true))
        .all(conn)
        .await?;
    Ok(instances
        .iter()
        .filter(|s| def_ids.contains(&s.stage_definition_id))
        .all(|s| s.is_done()))
}

type Transition = Option<(Uuid, ShipmentStatus, ShipmentStatus)>;

/// Forward gate: PRE_LOADING → READY when the pre-loading phase closes,
/// READY → SHIPPED when the shipment phase closes. Only adjacent moves;
/// completing shipment-phase stages early never skips READY.
async fn advance_gate<C: ConnectionTrait>(
    conn: &C,
    shipment_id: Uuid,
    phase: WorkflowPhase,
) -> Result<Transition, ServiceError> {
    let parent = shipment::Entity::find_by_id(shipment_id)
        .one(conn)
        .await?
        .ok_or_else(|| ServiceError::not_found("shipment", shipment_id))?;
    let current = parent
        .status()
        .ok_or_else(|| ServiceError::InternalError(format!("unknown shipment status {}", parent.status)))?;

    let next = match (phase, current) {
        (WorkflowPhase::PreLoading, ShipmentStatus::PreLoading)
            if phase_complete(conn, shipment_id, WorkflowPhase::PreLoading).await? =>
        {
            Some(ShipmentStatus::Ready)
        }
        (WorkflowPhase::Shipment, ShipmentStatus::Ready)
            if phase_complete(conn, shipment_id, WorkflowPhase::Shipment).await? =>
        {
            Some(ShipmentStatus::Shipped)
        }
        _ => None,
    };

    apply_transition(conn, parent, current, next).await
}

/// Regression gate: a reopened pre-loading stage pulls any shipment back to
/// PRE_LOADING; a reopened shipment-phase stage pulls SHIPPED back to READY.
async fn regress_gate<C: ConnectionTrait>(
    conn: &C,
    shipment_id: Uuid,
    phase: WorkflowPhase,
) -> Result<Transition, ServiceError> {
    let parent = shipment::Entity::find_by_id(shipment_id)
        .one(conn)
        .await?
        .ok_or_else(|| ServiceError::not_found("shipment", shipment_id))?;
    let current = parent
        .status()
        .ok_or_else(|| ServiceError::InternalError(format!("unknown shipment status {}", parent.status)))?;

    let next = match (phase, current) {
        (WorkflowPhase::PreLoading, ShipmentStatus::Ready)
        | (WorkflowPhase::PreLoading, ShipmentStatus::Shipped)
            if !phase_complete(conn, shipment_id, WorkflowPhase::PreLoading).await? =>
        {
            Some(ShipmentStatus::PreLoading)
        }
        (WorkflowPhase::Shipment, ShipmentStatus::Shipped)
            if !phase_complete(conn, shipment_id, WorkflowPhase::Shipment).await? =>
        {
            Some(ShipmentStatus::Ready)
        }
        _ => None,
    };

    apply_transition(conn, parent, current, next).await
}

async fn apply_transition<C: ConnectionTrait>(
    conn: &C,
    parent: shipment::Model,
    current: ShipmentStatus,
    next: Option<ShipmentStatus>,
) -> Result<Transition, ServiceError> {
    match next {
        Some(next) if next != current => {
            let shipment_id = parent.id;
            let mut active: shipment::ActiveModel = parent.into();
            active.status = Set(next.as_str().to_string());
            active.update(conn).await?;
            Ok(Some((shipment_id, current, next)))
        }
        _ => Ok(None),
    }
}
