//! Font faces available to layout and rasterization.
//!
//! A small set of DejaVu faces is compiled in so output never depends on
//! what the host has installed. Extra faces can be loaded from files at
//! runtime; until such a face is ready, text requesting it renders in the
//! default face and the scene records the pending font as a resource.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

use quoteme_common::config::FontFileConfig;
use quoteme_common::error::{QuotemeError, QuotemeResult};
use quoteme_scene_model::style::{FontWeight, ResourceKey};
use rusttype::Font;

use crate::resources::{Resource, ResourceCache};

/// Family used when nothing requested is available.
pub const DEFAULT_FAMILY: &str = "dejavu sans";

const BUNDLED: &[(&str, FontWeight, &[u8])] = &[
    (
        "dejavu sans",
        FontWeight::Regular,
        include_bytes!("../assets/fonts/DejaVuSans.ttf"),
    ),
    (
        "dejavu sans",
        FontWeight::Bold,
        include_bytes!("../assets/fonts/DejaVuSans-Bold.ttf"),
    ),
    (
        "dejavu sans",
        FontWeight::Light,
        include_bytes!("../assets/fonts/DejaVuSans-ExtraLight.ttf"),
    ),
    (
        "dejavu serif",
        FontWeight::Regular,
        include_bytes!("../assets/fonts/DejaVuSerif.ttf"),
    ),
    (
        "dejavu serif",
        FontWeight::Bold,
        include_bytes!("../assets/fonts/DejaVuSerif-Bold.ttf"),
    ),
    (
        "dejavu sans mono",
        FontWeight::Regular,
        include_bytes!("../assets/fonts/DejaVuSansMono.ttf"),
    ),
];

/// Identifies one loaded face.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FaceKey {
    /// Normalized (lowercase) family name.
    pub family: String,
    pub weight: FontWeight,
}

impl FaceKey {
    pub fn new(family: &str, weight: FontWeight) -> Self {
        Self {
            family: normalize_family(family),
            weight,
        }
    }
}

/// Outcome of resolving a requested family and weight.
#[derive(Clone)]
pub struct ResolvedFace {
    pub key: FaceKey,
    pub font: Arc<Font<'static>>,
    /// None of the requested families matched; `key` is the default face.
    pub fallback: bool,
    /// A requested family that is still loading.
    pub pending: Option<ResourceKey>,
}

impl std::fmt::Debug for ResolvedFace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedFace")
            .field("key", &self.key)
            .field("fallback", &self.fallback)
            .field("pending", &self.pending)
            .finish()
    }
}

/// Registry of loaded faces plus faces declared but still loading.
pub struct FontRegistry {
    faces: RwLock<HashMap<FaceKey, Arc<Font<'static>>>>,
    declared: RwLock<HashSet<FaceKey>>,
}

impl FontRegistry {
    /// Registry with only the bundled faces.
    pub fn bundled() -> Self {
        let mut faces = HashMap::new();
        for (family, weight, bytes) in BUNDLED {
            match Font::try_from_bytes(*bytes) {
                Some(font) => {
                    faces.insert(FaceKey::new(family, *weight), Arc::new(font));
                }
                None => tracing::error!(family, weight = weight.keyword(), "Bundled font is unreadable"),
            }
        }
        Self {
            faces: RwLock::new(faces),
            declared: RwLock::new(HashSet::new()),
        }
    }

    /// Shared registry with the bundled faces.
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::bundled())
    }

    /// Add a face, replacing any face with the same family and weight.
    pub fn insert(&self, family: &str, weight: FontWeight, font: Arc<Font<'static>>) {
        let key = FaceKey::new(family, weight);
        tracing::debug!(family = %key.family, weight = weight.keyword(), "Font face registered");
        self.faces
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, font);
    }

    /// Announce a face that will be loaded later. Returns its resource key.
    pub fn declare(&self, family: &str, weight: FontWeight) -> ResourceKey {
        let key = FaceKey::new(family, weight);
        let resource = ResourceKey::font(&key.family, weight);
        self.declared
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key);
        resource
    }

    /// Look up an exact face.
    pub fn face(&self, key: &FaceKey) -> Option<Arc<Font<'static>>> {
        self.faces
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    /// Resolve a CSS-like family list (`"Playfair, serif"`) and weight.
    ///
    /// The first family with any loaded face wins, using the closest
    /// available weight. With no match the default sans face is used and
    /// the result is marked as a fallback. Returns `None` only when the
    /// registry holds no faces at all.
    pub fn resolve(&self, families: &str, weight: FontWeight) -> Option<ResolvedFace> {
        let faces = self.faces.read().unwrap_or_else(PoisonError::into_inner);
        let declared = self.declared.read().unwrap_or_else(PoisonError::into_inner);
        let mut pending = None;

        for candidate in families.split(',').map(normalize_family) {
            if candidate.is_empty() {
                continue;
            }
            if let Some((key, font)) = closest_weight(&faces, &candidate, weight) {
                return Some(ResolvedFace {
                    key,
                    font,
                    fallback: false,
                    pending,
                });
            }
            if pending.is_none() && declared.contains(&FaceKey::new(&candidate, weight)) {
                pending = Some(ResourceKey::font(&candidate, weight));
            }
        }

        let (key, font) = closest_weight(&faces, DEFAULT_FAMILY, weight)
            .or_else(|| faces.iter().next().map(|(k, f)| (k.clone(), f.clone())))?;
        Some(ResolvedFace {
            key,
            font,
            fallback: true,
            pending,
        })
    }

    /// Loaded families with their weights, sorted by family.
    pub fn families(&self) -> Vec<(String, Vec<FontWeight>)> {
        let faces = self.faces.read().unwrap_or_else(PoisonError::into_inner);
        let mut by_family: HashMap<&str, Vec<FontWeight>> = HashMap::new();
        for key in faces.keys() {
            by_family.entry(key.family.as_str()).or_default().push(key.weight);
        }
        let mut families: Vec<(String, Vec<FontWeight>)> = by_family
            .into_iter()
            .map(|(family, mut weights)| {
                weights.sort_by_key(weight_rank);
                (family.to_string(), weights)
            })
            .collect();
        families.sort_by(|a, b| a.0.cmp(&b.0));
        families
    }

    /// Start loading a font file in the background.
    ///
    /// The face is declared immediately and becomes available once the
    /// returned resource key settles as ready in `cache`.
    pub fn load_file(
        self: &Arc<Self>,
        cache: &Arc<ResourceCache>,
        family: &str,
        weight: FontWeight,
        path: impl Into<PathBuf>,
    ) -> ResourceKey {
        let key = self.declare(family, weight);
        if !cache.insert_pending(&key) {
            return key;
        }

        let registry = Arc::clone(self);
        let task_cache = Arc::clone(cache);
        let task_key = key.clone();
        let family = normalize_family(family);
        let path = path.into();
        let load = async move {
            match read_font(&path).await {
                Ok(font) => {
                    let font = Arc::new(font);
                    registry.insert(&family, weight, font.clone());
                    task_cache.complete(&task_key, Resource::Font(font));
                }
                Err(e) => task_cache.fail(&task_key, e.to_string()),
            }
        };

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(load);
            }
            Err(_) => cache.fail(&key, "no async runtime to load the font"),
        }
        key
    }

    /// Start loading every font listed in the configuration.
    pub fn load_configured(
        self: &Arc<Self>,
        cache: &Arc<ResourceCache>,
        fonts: &[FontFileConfig],
    ) -> Vec<ResourceKey> {
        fonts
            .iter()
            .map(|entry| {
                let weight = FontWeight::from_keyword(&entry.weight).unwrap_or_else(|| {
                    tracing::warn!(
                        family = %entry.family,
                        weight = %entry.weight,
                        "Unknown font weight, using regular"
                    );
                    FontWeight::Regular
                });
                self.load_file(cache, &entry.family, weight, &entry.path)
            })
            .collect()
    }
}

impl Default for FontRegistry {
    fn default() -> Self {
        Self::bundled()
    }
}

impl std::fmt::Debug for FontRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FontRegistry")
            .field("families", &self.families())
            .finish()
    }
}

/// Lowercase, unquote and map generic families to bundled ones.
pub fn normalize_family(family: &str) -> String {
    let name = family
        .trim()
        .trim_matches(|c| c == '"' || c == '\'')
        .trim()
        .to_ascii_lowercase();
    match name.as_str() {
        "sans-serif" | "sans" | "system-ui" | "ui-sans-serif" => DEFAULT_FAMILY.to_string(),
        "serif" | "ui-serif" => "dejavu serif".to_string(),
        "monospace" | "mono" | "ui-monospace" => "dejavu sans mono".to_string(),
        _ => name,
    }
}

fn weight_rank(weight: &FontWeight) -> u8 {
    match weight {
        FontWeight::Light => 0,
        FontWeight::Regular => 1,
        FontWeight::Bold => 2,
    }
}

fn closest_weight(
    faces: &HashMap<FaceKey, Arc<Font<'static>>>,
    family: &str,
    weight: FontWeight,
) -> Option<(FaceKey, Arc<Font<'static>>)> {
    let order: [FontWeight; 3] = match weight {
        FontWeight::Light => [FontWeight::Light, FontWeight::Regular, FontWeight::Bold],
        FontWeight::Regular => [FontWeight::Regular, FontWeight::Bold, FontWeight::Light],
        FontWeight::Bold => [FontWeight::Bold, FontWeight::Regular, FontWeight::Light],
    };
    order.into_iter().find_map(|w| {
        let key = FaceKey {
            family: family.to_string(),
            weight: w,
        };
        faces.get(&key).map(|font| (key, font.clone()))
    })
}

async fn read_font(path: &Path) -> QuotemeResult<Font<'static>> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| QuotemeError::read(path, e))?;
    Font::try_from_vec(bytes).ok_or_else(|| {
        QuotemeError::resource(format!("{}: not a usable TrueType font", path.display()))
    })
}
