//! Configuration snapshot assembly.
//!
//! [`SnapshotAssembler`] resolves the two chain paths needed to describe an
//! IPL (PSA→CVT→ECVT→IPA and PSA→CVT→CVTEXT2) and extracts the four snapshot
//! fields from them. The first failure ends the request; no partial snapshot
//! is returned.

use std::fmt;

use serde::Serialize;

use crate::error::{LayoutError, Result, SnapshotError};
use crate::extract::{extract, FieldValue};
use crate::layout::{
    FieldDescriptor, LayoutCatalog, CVT, CVTECVT, CVTEXT2, CVTEXT2_PTR, ECVT, ECVTIPA, IODF_ID,
    IPA, IPALOADS, IPALPDDV, IPALPDSN, PSA, PSACVT,
};
use crate::storage::{ControlBlockLocator, RootHandle};
use crate::walker::{resolve, BlockRef, ChainPath};

// ---------------------------------------------------------------------------
//  Snapshot fields
// ---------------------------------------------------------------------------

/// The named values a snapshot carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SnapshotField {
    /// LOADxx member suffix (IPALOADS).
    LoadDataset,
    /// Dataset holding LOADxx (IPALPDSN).
    ParmlibDatasetName,
    /// Device number of the LOADxx volume (IPALPDDV).
    DeviceId,
    /// Active IODF identifier.
    IodfId,
}

impl SnapshotField {
    /// All fields in extraction order.
    pub const ALL: [SnapshotField; 4] = [
        SnapshotField::LoadDataset,
        SnapshotField::ParmlibDatasetName,
        SnapshotField::DeviceId,
        SnapshotField::IodfId,
    ];

    /// Stable lowercase name used in diagnostics.
    pub fn as_str(self) -> &'static str {
        match self {
            SnapshotField::LoadDataset => "load-dataset",
            SnapshotField::ParmlibDatasetName => "parmlib-dataset-name",
            SnapshotField::DeviceId => "device-id",
            SnapshotField::IodfId => "iodf-id",
        }
    }
}

impl fmt::Display for SnapshotField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
//  Snapshot
// ---------------------------------------------------------------------------

/// IPL configuration read from the control blocks. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConfigurationSnapshot {
    load_dataset: FieldValue,
    parmlib_dataset_name: FieldValue,
    device_id: FieldValue,
    iodf_id: FieldValue,
}

impl ConfigurationSnapshot {
    /// LOADxx member suffix.
    pub fn load_dataset(&self) -> &str {
        self.load_dataset.as_str()
    }

    /// Parmlib dataset the LOADxx member was read from.
    pub fn parmlib_dataset_name(&self) -> &str {
        self.parmlib_dataset_name.as_str()
    }

    /// Device number of the parmlib volume.
    pub fn device_id(&self) -> &str {
        self.device_id.as_str()
    }

    /// Active IODF identifier.
    pub fn iodf_id(&self) -> &str {
        self.iodf_id.as_str()
    }

    /// The length-tagged value behind a field.
    pub fn value(&self, field: SnapshotField) -> &FieldValue {
        match field {
            SnapshotField::LoadDataset => &self.load_dataset,
            SnapshotField::ParmlibDatasetName => &self.parmlib_dataset_name,
            SnapshotField::DeviceId => &self.device_id,
            SnapshotField::IodfId => &self.iodf_id,
        }
    }
}

// ---------------------------------------------------------------------------
//  Assembler
// ---------------------------------------------------------------------------

/// Builds [`ConfigurationSnapshot`]s from a validated layout catalog.
///
/// Holds only immutable descriptors, so one assembler can serve concurrent
/// requests.
#[derive(Debug, Clone)]
pub struct SnapshotAssembler {
    ipa_path: ChainPath,
    ext2_path: ChainPath,
    load_dataset: FieldDescriptor,
    parmlib_dataset_name: FieldDescriptor,
    device_id: FieldDescriptor,
    iodf_id: FieldDescriptor,
}

impl SnapshotAssembler {
    /// Derive chain paths and field descriptors from `catalog`.
    pub fn new(catalog: &LayoutCatalog) -> Result<Self, LayoutError> {
        Ok(Self {
            ipa_path: catalog.chain_path(
                "ipa",
                &[(PSA, PSACVT), (CVT, CVTECVT), (ECVT, ECVTIPA)],
                IPA,
            )?,
            ext2_path: catalog.chain_path("cvtext2", &[(PSA, PSACVT), (CVT, CVTEXT2_PTR)], CVTEXT2)?,
            load_dataset: catalog.text_field(IPA, IPALOADS)?,
            parmlib_dataset_name: catalog.text_field(IPA, IPALPDSN)?,
            device_id: catalog.text_field(IPA, IPALPDDV)?,
            iodf_id: catalog.text_field(CVTEXT2, IODF_ID)?,
        })
    }

    /// Assembler over the built-in z/OS catalog.
    pub fn zos() -> Result<Self, LayoutError> {
        Self::new(&LayoutCatalog::zos()?)
    }

    /// Read all snapshot fields starting from `root`.
    pub fn build_snapshot(
        &self,
        root: &RootHandle<'_>,
    ) -> Result<ConfigurationSnapshot> {
        let ipa = self.locate(root, &self.ipa_path, SnapshotField::LoadDataset)?;
        let load_dataset = read(&ipa, &self.load_dataset, SnapshotField::LoadDataset)?;
        let parmlib_dataset_name =
            read(&ipa, &self.parmlib_dataset_name, SnapshotField::ParmlibDatasetName)?;
        let device_id = read(&ipa, &self.device_id, SnapshotField::DeviceId)?;

        let ext2 = self.locate(root, &self.ext2_path, SnapshotField::IodfId)?;
        let iodf_id = read(&ext2, &self.iodf_id, SnapshotField::IodfId)?;

        let snapshot = ConfigurationSnapshot {
            load_dataset,
            parmlib_dataset_name,
            device_id,
            iodf_id,
        };
        tracing::info!(
            load = %snapshot.load_dataset(),
            parmlib = %snapshot.parmlib_dataset_name(),
            device = %snapshot.device_id(),
            iodf = %snapshot.iodf_id(),
            "IPL configuration snapshot built"
        );
        Ok(snapshot)
    }

    /// Ask `locator` for the root, then build a snapshot from it.
    pub fn snapshot_from(
        &self,
        locator: &dyn ControlBlockLocator,
    ) -> Result<ConfigurationSnapshot> {
        let root = locator
            .locate()
            .map_err(|source| SnapshotError::Traversal {
                field: SnapshotField::LoadDataset,
                source,
            })?;
        self.build_snapshot(&root)
    }

    fn locate<'a>(
        &'a self,
        root: &RootHandle<'a>,
        path: &'a ChainPath,
        field: SnapshotField,
    ) -> Result<BlockRef<'a>> {
        resolve(root, path).map_err(|source| SnapshotError::Traversal { field, source })
    }
}

fn read(
    block: &BlockRef<'_>,
    descriptor: &FieldDescriptor,
    field: SnapshotField,
) -> Result<FieldValue> {
    extract(block, descriptor).map_err(|source| {
        tracing::warn!(%field, %source, "Field extraction failed");
        SnapshotError::Extraction { field, source }
    })
}
