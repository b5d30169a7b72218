//! Prefetch requests discovered while parsing.
//!
//! Loads travel beside tree ops but run first in every flush. Manifests are
//! not speculative (they commit once seen); they ride this queue so they keep
//! their order relative to the base URL and the other loads.

use core_types::ResourceKind;

use crate::executor::{ExecutorHost, TreeOpExecutor};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SpeculativeLoad {
    SetBase {
        url: String,
    },
    Image {
        url: String,
    },
    Script {
        url: String,
        charset: Option<String>,
        mime_type: Option<String>,
    },
    Style {
        url: String,
        charset: Option<String>,
    },
    Manifest {
        url: String,
    },
}

impl SpeculativeLoad {
    pub fn url(&self) -> &str {
        match self {
            SpeculativeLoad::SetBase { url }
            | SpeculativeLoad::Image { url }
            | SpeculativeLoad::Script { url, .. }
            | SpeculativeLoad::Style { url, .. }
            | SpeculativeLoad::Manifest { url } => url,
        }
    }

    /// What a prefetcher would fetch; `None` for `SetBase`.
    pub fn resource_kind(&self) -> Option<ResourceKind> {
        match self {
            SpeculativeLoad::SetBase { .. } => None,
            SpeculativeLoad::Image { .. } => Some(ResourceKind::Image),
            SpeculativeLoad::Script { .. } => Some(ResourceKind::Script),
            SpeculativeLoad::Style { .. } => Some(ResourceKind::Style),
            SpeculativeLoad::Manifest { .. } => Some(ResourceKind::Manifest),
        }
    }

    pub fn perform<H: ExecutorHost>(self, executor: &mut TreeOpExecutor<H>) {
        if executor.config().view_source && !matches!(self, SpeculativeLoad::SetBase { .. }) {
            return;
        }
        match self {
            SpeculativeLoad::SetBase { url } => executor.set_speculation_base(&url),
            SpeculativeLoad::Image { url } => executor.preload_image(&url),
            SpeculativeLoad::Script {
                url,
                charset,
                mime_type,
            } => executor.preload_script(&url, charset.as_deref(), mime_type.as_deref()),
            SpeculativeLoad::Style { url, charset } => {
                executor.preload_style(&url, charset.as_deref())
            }
            SpeculativeLoad::Manifest { url } => executor.process_offline_manifest(&url),
        }
    }
}
