//! URL masking: render one route while the address bar shows another.
//!
//! A mask maps an actual route (`from`) onto a displayed URL (`to`). When
//! `use_search_param` is set, the actual path travels with the displayed one
//! as a URL-safe base64 suffix after `__` in the last segment, so a reload
//! can recover it without any history state.

use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig};
use base64::engine::DecodePaddingMode;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

use crate::route::pattern::{
    compile_pattern, interpolate_segments, parse_segments, CompiledPattern, Params, PatternError,
    Segment,
};

const UNMASK_SEPARATOR: &str = "__";

const UNMASK_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new()
        .with_encode_padding(false)
        .with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Parameter forwarding from `from` to `to`.
#[derive(Clone, Default)]
pub enum MaskParams {
    /// Forward every matched parameter.
    #[default]
    All,
    /// Forward nothing; dynamic segments of `to` render empty.
    None,
    Transform(Arc<dyn Fn(&Params) -> Params + Send + Sync>),
}

impl MaskParams {
    pub fn transform<F>(f: F) -> Self
    where
        F: Fn(&Params) -> Params + Send + Sync + 'static,
    {
        MaskParams::Transform(Arc::new(f))
    }

    fn apply(&self, matched: &Params) -> Params {
        match self {
            MaskParams::All => matched.clone(),
            MaskParams::None => Params::new(),
            MaskParams::Transform(f) => f(matched),
        }
    }
}

impl From<bool> for MaskParams {
    fn from(forward: bool) -> Self {
        if forward {
            MaskParams::All
        } else {
            MaskParams::None
        }
    }
}

impl fmt::Debug for MaskParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MaskParams::All => f.write_str("All"),
            MaskParams::None => f.write_str("None"),
            MaskParams::Transform(_) => f.write_str("Transform(..)"),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RouteMaskOptions {
    pub from: String,
    pub to: String,
    pub params: MaskParams,
    pub unmask_on_reload: bool,
    pub use_search_param: bool,
}

impl RouteMaskOptions {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            ..Self::default()
        }
    }

    pub fn with_params(mut self, params: impl Into<MaskParams>) -> Self {
        self.params = params.into();
        self
    }

    pub fn with_unmask_on_reload(mut self, unmask: bool) -> Self {
        self.unmask_on_reload = unmask;
        self
    }

    pub fn with_search_param(mut self, enabled: bool) -> Self {
        self.use_search_param = enabled;
        self
    }
}

/// A compiled mask. Built once at configuration load.
#[derive(Debug, Clone)]
pub struct RouteMask {
    pub from: String,
    pub to: String,
    pub params: MaskParams,
    pub unmask_on_reload: bool,
    pub use_search_param: bool,
    from_pattern: CompiledPattern,
    to_segments: Vec<Segment>,
}

impl RouteMask {
    pub fn new(options: RouteMaskOptions) -> Result<Self, PatternError> {
        let from_pattern = compile_pattern(&options.from)?;
        let to_segments = parse_segments(&options.to)?;
        Ok(Self {
            from: options.from,
            to: options.to,
            params: options.params,
            unmask_on_reload: options.unmask_on_reload,
            use_search_param: options.use_search_param,
            from_pattern,
            to_segments,
        })
    }

    pub fn from_param_names(&self) -> &[String] {
        self.from_pattern.param_names()
    }

    /// The anchored expression compiled from `from`.
    pub fn from_regex(&self) -> &str {
        self.from_pattern.regex().as_str()
    }
}

/// Compiles a mask.
pub fn create_route_mask(options: RouteMaskOptions) -> Result<RouteMask, PatternError> {
    RouteMask::new(options)
}

/// Parameters captured by the mask's `from` pattern, or `None`.
pub fn match_route_mask(pathname: &str, mask: &RouteMask) -> Option<Params> {
    mask.from_pattern.captures(pathname)
}

/// Substitutes forwarded parameters into `to`. Missing parameters leave the
/// segment empty.
pub fn build_masked_path(mask: &RouteMask, matched: &Params) -> String {
    let params = mask.params.apply(matched);
    interpolate_segments(&mask.to_segments, &params)
}

pub fn encode_unmask(path: &str) -> String {
    UNMASK_ENGINE.encode(path.as_bytes())
}

/// Reverses [`encode_unmask`]. `None` for anything that is not URL-safe
/// base64 of UTF-8 text.
pub fn decode_unmask(encoded: &str) -> Option<String> {
    let bytes = UNMASK_ENGINE.decode(encoded).ok()?;
    String::from_utf8(bytes).ok()
}

/// Splits `/photos/3__<encoded>` into the displayed path and the decoded
/// actual path. Only the final segment is searched, right to left, and only
/// a suffix decoding to an absolute path counts.
pub fn split_unmask_suffix(pathname: &str) -> Option<(String, String)> {
    let last_start = pathname.rfind('/').map(|i| i + 1).unwrap_or(0);
    let last = &pathname[last_start..];

    let mut end = last.len();
    while let Some(at) = last[..end].rfind(UNMASK_SEPARATOR) {
        let encoded = &last[at + UNMASK_SEPARATOR.len()..];
        if let Some(actual) = decode_unmask(encoded).filter(|p| p.starts_with('/')) {
            let displayed = format!("{}{}", &pathname[..last_start], &last[..at]);
            return Some((displayed, actual));
        }
        // `___` overlaps, so step back a single byte
        end = at + 1;
    }
    None
}

/// Decoded actual path carried by `pathname`, if any.
///
/// ```
/// use onyx_router::mask::parse_unmask_from_path;
///
/// assert_eq!(
///     parse_unmask_from_path("/photos/3__L3Bob3Rvcy8zL21vZGFs").as_deref(),
///     Some("/photos/3/modal")
/// );
/// assert_eq!(parse_unmask_from_path("/photos/3"), None);
/// ```
pub fn parse_unmask_from_path(pathname: &str) -> Option<String> {
    split_unmask_suffix(pathname).map(|(_, actual)| actual)
}

/// Result of applying the first matching mask.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MaskMatch {
    pub masked_path: String,
    pub unmask_on_reload: bool,
    pub use_search_param: bool,
    pub actual_path: String,
}

/// First mask, in list order, whose `from` matches `pathname`.
pub fn find_matching_mask(pathname: &str, masks: &[RouteMask]) -> Option<MaskMatch> {
    masks.iter().find_map(|mask| {
        let matched = match_route_mask(pathname, mask)?;
        let displayed = build_masked_path(mask, &matched);
        let masked_path = if mask.use_search_param {
            format!("{}{}{}", displayed, UNMASK_SEPARATOR, encode_unmask(pathname))
        } else {
            displayed
        };
        Some(MaskMatch {
            masked_path,
            unmask_on_reload: mask.unmask_on_reload,
            use_search_param: mask.use_search_param,
            actual_path: pathname.to_string(),
        })
    })
}

/// What a masked navigation stores in its history entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MaskState {
    pub actual_path: String,
    pub unmask_on_reload: bool,
}

impl From<&MaskMatch> for MaskState {
    fn from(found: &MaskMatch) -> Self {
        Self {
            actual_path: found.actual_path.clone(),
            unmask_on_reload: found.unmask_on_reload,
        }
    }
}

/// The ordered mask list of a running application.
#[derive(Debug, Clone, Default)]
pub struct MaskEngine {
    masks: Vec<RouteMask>,
}

impl MaskEngine {
    pub fn new(masks: Vec<RouteMask>) -> Self {
        Self { masks }
    }

    pub fn from_options<I>(options: I) -> Result<Self, PatternError>
    where
        I: IntoIterator<Item = RouteMaskOptions>,
    {
        let masks = options
            .into_iter()
            .map(RouteMask::new)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { masks })
    }

    pub fn masks(&self) -> &[RouteMask] {
        &self.masks
    }

    pub fn is_empty(&self) -> bool {
        self.masks.is_empty()
    }

    pub fn find(&self, pathname: &str) -> Option<MaskMatch> {
        find_matching_mask(pathname, &self.masks)
    }

    /// Path to render on a fresh load of `displayed`.
    ///
    /// A `__` suffix wins over history state, but only when a search-param
    /// mask would have produced exactly that displayed path from the decoded
    /// one; any other suffix is part of the path. Either way, a mask with
    /// `unmask_on_reload` renders the displayed URL's own route instead of
    /// the actual one.
    pub fn resolve_initial(&self, displayed: &str, state: Option<&MaskState>) -> String {
        if let Some((shown, actual, mask)) = self.unmask_suffix(displayed) {
            let unmask = mask.unmask_on_reload;
            debug!(displayed, actual = %actual, unmask, "Resolved masked path from suffix");
            return if unmask { shown } else { actual };
        }

        match state {
            Some(state) if !state.unmask_on_reload => state.actual_path.clone(),
            _ => displayed.to_string(),
        }
    }

    fn unmask_suffix(&self, displayed: &str) -> Option<(String, String, &RouteMask)> {
        let (shown, actual) = split_unmask_suffix(displayed)?;
        let mask = self.masks.iter().filter(|m| m.use_search_param).find(|mask| {
            match_route_mask(&actual, mask)
                .map(|matched| build_masked_path(mask, &matched) == shown)
                .unwrap_or(false)
        })?;
        Some((shown, actual, mask))
    }
}
