//! Boosted Haar cascade model and its OpenCV XML readers.
//!
//! Two layouts are understood:
//! - the current `<cascade>` layout (`stageType`/`featureType`/`stages`/
//!   `features`, trees flattened into `internalNodes` + `leafValues`), and
//! - the legacy `opencv-haar-classifier` layout with `<size>` and nested
//!   `<trees>` whose nodes carry their own feature.
//!
//! Both are normalised into the same flat representation: stages of weak
//! trees whose nodes index a shared feature table.

use std::path::Path;

use roxmltree::Node;
use thiserror::Error;

/// OpenCV lowers every stage threshold by this much when loading.
const STAGE_THRESHOLD_EPS: f64 = 1e-5;

#[derive(Error, Debug)]
pub enum CascadeParseError {
    #[error("cannot read cascade: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed XML: {0}")]
    Xml(#[from] roxmltree::Error),
    #[error("missing <{0}>")]
    Missing(String),
    #[error("invalid value in <{tag}>: '{value}'")]
    Invalid { tag: String, value: String },
    #[error("unsupported cascade: {0}")]
    Unsupported(String),
}

/// A rectangle inside the detection window and its weight in the feature sum.
#[derive(Clone, Debug, PartialEq)]
pub struct WeightedRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    pub weight: f64,
}

/// Upright Haar-like feature: weighted sum of up to three rectangle sums.
#[derive(Clone, Debug, PartialEq)]
pub struct HaarFeature {
    pub rects: Vec<WeightedRect>,
}

/// Split node of a weak tree.
///
/// Children `<= 0` are leaves: `-child` indexes the tree's leaf values.
#[derive(Clone, Debug, PartialEq)]
pub struct DecisionNode {
    pub feature: usize,
    pub threshold: f64,
    pub left: i32,
    pub right: i32,
}

#[derive(Clone, Debug, PartialEq)]
pub struct WeakTree {
    pub nodes: Vec<DecisionNode>,
    pub leaves: Vec<f64>,
}

impl WeakTree {
    /// Walks the tree with normalised feature responses from `response`.
    pub fn evaluate(&self, mut response: impl FnMut(usize) -> f64) -> f64 {
        let mut idx: i32 = 0;
        loop {
            let node = &self.nodes[idx as usize];
            idx = if response(node.feature) < node.threshold {
                node.left
            } else {
                node.right
            };
            if idx <= 0 {
                return self.leaves[(-idx) as usize];
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Stage {
    /// Already lowered by [`STAGE_THRESHOLD_EPS`].
    pub threshold: f64,
    pub trees: Vec<WeakTree>,
}

/// A loaded, immutable cascade classifier.
#[derive(Clone, Debug, PartialEq)]
pub struct HaarCascade {
    window_width: u32,
    window_height: u32,
    stages: Vec<Stage>,
    features: Vec<HaarFeature>,
}

impl HaarCascade {
    pub fn new(
        window_width: u32,
        window_height: u32,
        stages: Vec<Stage>,
        features: Vec<HaarFeature>,
    ) -> Result<Self, CascadeParseError> {
        let cascade = Self {
            window_width,
            window_height,
            stages,
            features,
        };
        cascade.check()?;
        Ok(cascade)
    }

    pub fn from_file(path: &Path) -> Result<Self, CascadeParseError> {
        let xml = std::fs::read_to_string(path)?;
        Self::from_xml_str(&xml)
    }

    pub fn from_xml_str(xml: &str) -> Result<Self, CascadeParseError> {
        let document = roxmltree::Document::parse(xml)?;
        let storage = document.root_element();
        let cascade = storage
            .children()
            .find(Node::is_element)
            .ok_or_else(|| CascadeParseError::Missing("cascade".into()))?;

        if child_element(cascade, "stageType").is_some() {
            parse_current(cascade)
        } else if child_element(cascade, "size").is_some() {
            parse_legacy(cascade)
        } else {
            Err(CascadeParseError::Unsupported(format!(
                "<{}> is neither a current nor a legacy Haar cascade",
                cascade.tag_name().name()
            )))
        }
    }

    pub fn window_size(&self) -> (u32, u32) {
        (self.window_width, self.window_height)
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    pub fn features(&self) -> &[HaarFeature] {
        &self.features
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Every index and rectangle must be usable by the evaluator.
    fn check(&self) -> Result<(), CascadeParseError> {
        if self.window_width < 3 || self.window_height < 3 {
            return Err(CascadeParseError::Unsupported(format!(
                "window {}x{} is too small",
                self.window_width, self.window_height
            )));
        }
        for feature in &self.features {
            for r in &feature.rects {
                if r.x.saturating_add(r.width) > self.window_width
                    || r.y.saturating_add(r.height) > self.window_height
                {
                    return Err(CascadeParseError::Unsupported(format!(
                        "feature rectangle {} {} {} {} leaves the {}x{} window",
                        r.x, r.y, r.width, r.height, self.window_width, self.window_height
                    )));
                }
            }
        }
        for tree in self.stages.iter().flat_map(|s| &s.trees) {
            if tree.nodes.is_empty() {
                return Err(CascadeParseError::Unsupported("weak tree without nodes".into()));
            }
            for (index, node) in tree.nodes.iter().enumerate() {
                if node.feature >= self.features.len() {
                    return Err(CascadeParseError::Unsupported(format!(
                        "node references feature {} of {}",
                        node.feature,
                        self.features.len()
                    )));
                }
                for child in [node.left, node.right] {
                    let ok = if child <= 0 {
                        ((-child) as usize) < tree.leaves.len()
                    } else {
                        (child as usize) < tree.nodes.len()
                    };
                    if !ok {
                        return Err(CascadeParseError::Unsupported(format!(
                            "tree child {child} out of range"
                        )));
                    }
                    // Children only point forward, so every walk ends at a leaf.
                    if child > 0 && child as usize <= index {
                        return Err(CascadeParseError::Unsupported(format!(
                            "node {index} links back to node {child}"
                        )));
                    }
                }
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Current layout
// ---------------------------------------------------------------------------

fn parse_current(cascade: Node<'_, '_>) -> Result<HaarCascade, CascadeParseError> {
    let stage_type = required_text(cascade, "stageType")?;
    if stage_type != "BOOST" {
        return Err(CascadeParseError::Unsupported(format!(
            "stage type {stage_type}"
        )));
    }
    let feature_type = required_text(cascade, "featureType")?;
    if feature_type != "HAAR" {
        return Err(CascadeParseError::Unsupported(format!(
            "feature type {feature_type}"
        )));
    }
    let width = parse_number::<u32>(cascade, "width")?;
    let height = parse_number::<u32>(cascade, "height")?;

    let mut stages = Vec::new();
    for stage in items(required_element(cascade, "stages")?) {
        let threshold = parse_number::<f64>(stage, "stageThreshold")? - STAGE_THRESHOLD_EPS;
        let mut trees = Vec::new();
        for classifier in items(required_element(stage, "weakClassifiers")?) {
            trees.push(parse_flat_tree(classifier)?);
        }
        stages.push(Stage { threshold, trees });
    }

    let mut features = Vec::new();
    for feature in items(required_element(cascade, "features")?) {
        features.push(parse_feature(feature)?);
    }

    HaarCascade::new(width, height, stages, features)
}

/// `internalNodes` holds `left right feature threshold` per node.
fn parse_flat_tree(classifier: Node<'_, '_>) -> Result<WeakTree, CascadeParseError> {
    let raw = numbers::<f64>(classifier, "internalNodes")?;
    if raw.is_empty() || raw.len() % 4 != 0 {
        return Err(invalid("internalNodes", &required_text(classifier, "internalNodes")?));
    }
    let nodes = raw
        .chunks_exact(4)
        .map(|n| DecisionNode {
            left: n[0] as i32,
            right: n[1] as i32,
            feature: n[2] as usize,
            threshold: n[3],
        })
        .collect();
    let leaves = numbers::<f64>(classifier, "leafValues")?;
    Ok(WeakTree { nodes, leaves })
}

fn parse_feature(feature: Node<'_, '_>) -> Result<HaarFeature, CascadeParseError> {
    if optional_text(feature, "tilted").is_some_and(|t| t != "0") {
        return Err(CascadeParseError::Unsupported(
            "tilted Haar features".into(),
        ));
    }
    let mut rects = Vec::new();
    for rect in items(required_element(feature, "rects")?) {
        let text = rect.text().map(str::trim).unwrap_or_default();
        rects.push(parse_rect(text)?);
    }
    if rects.is_empty() || rects.len() > 3 {
        return Err(CascadeParseError::Unsupported(format!(
            "feature with {} rectangles",
            rects.len()
        )));
    }
    Ok(HaarFeature { rects })
}

/// `x y width height weight`, where the weight may be written as `-1.`.
fn parse_rect(text: &str) -> Result<WeightedRect, CascadeParseError> {
    let parts: Vec<&str> = text.split_whitespace().collect();
    if parts.len() != 5 {
        return Err(invalid("rects", text));
    }
    let int = |s: &str| s.parse::<u32>().map_err(|_| invalid("rects", text));
    Ok(WeightedRect {
        x: int(parts[0])?,
        y: int(parts[1])?,
        width: int(parts[2])?,
        height: int(parts[3])?,
        weight: parts[4].parse::<f64>().map_err(|_| invalid("rects", text))?,
    })
}

// ---------------------------------------------------------------------------
// Legacy layout
// ---------------------------------------------------------------------------

fn parse_legacy(cascade: Node<'_, '_>) -> Result<HaarCascade, CascadeParseError> {
    let size = numbers::<u32>(cascade, "size")?;
    let &[width, height] = size.as_slice() else {
        return Err(invalid("size", &required_text(cascade, "size")?));
    };

    let mut features = Vec::new();
    let mut stages = Vec::new();
    for stage in items(required_element(cascade, "stages")?) {
        let threshold = parse_number::<f64>(stage, "stage_threshold")? - STAGE_THRESHOLD_EPS;
        let mut trees = Vec::new();
        for tree in items(required_element(stage, "trees")?) {
            trees.push(parse_legacy_tree(tree, &mut features)?);
        }
        stages.push(Stage { threshold, trees });
    }

    HaarCascade::new(width, height, stages, features)
}

/// Legacy nodes name a child either by node index (`left`) or by a
/// terminal value (`left_val`). Leaves are appended in visiting order.
fn parse_legacy_tree(
    tree: Node<'_, '_>,
    features: &mut Vec<HaarFeature>,
) -> Result<WeakTree, CascadeParseError> {
    let mut nodes = Vec::new();
    let mut leaves = Vec::new();
    for node in items(tree) {
        features.push(parse_feature(required_element(node, "feature")?)?);
        let feature = features.len() - 1;
        let threshold = parse_number::<f64>(node, "threshold")?;
        let left = legacy_child(node, "left", &mut leaves)?;
        let right = legacy_child(node, "right", &mut leaves)?;
        nodes.push(DecisionNode {
            feature,
            threshold,
            left,
            right,
        });
    }
    Ok(WeakTree { nodes, leaves })
}

fn legacy_child(
    node: Node<'_, '_>,
    side: &str,
    leaves: &mut Vec<f64>,
) -> Result<i32, CascadeParseError> {
    let value_tag = format!("{side}_val");
    if child_element(node, &value_tag).is_some() {
        leaves.push(parse_number::<f64>(node, &value_tag)?);
        return Ok(-((leaves.len() - 1) as i32));
    }
    let child = parse_number::<i32>(node, side)?;
    if child <= 0 {
        return Err(invalid(side, &child.to_string()));
    }
    Ok(child)
}

// ---------------------------------------------------------------------------
// XML helpers
// ---------------------------------------------------------------------------

/// OpenCV serialises sequences as runs of `<_>` elements.
fn items<'a, 'input>(node: Node<'a, 'input>) -> impl Iterator<Item = Node<'a, 'input>> {
    node.children()
        .filter(|child| child.is_element() && child.tag_name().name() == "_")
}

fn child_element<'a, 'input>(node: Node<'a, 'input>, tag: &str) -> Option<Node<'a, 'input>> {
    node.children()
        .find(|child| child.is_element() && child.tag_name().name() == tag)
}

fn required_element<'a, 'input>(
    node: Node<'a, 'input>,
    tag: &str,
) -> Result<Node<'a, 'input>, CascadeParseError> {
    child_element(node, tag).ok_or_else(|| CascadeParseError::Missing(tag.to_string()))
}

fn optional_text<'a>(node: Node<'a, '_>, tag: &str) -> Option<&'a str> {
    child_element(node, tag)
        .and_then(|child| child.text())
        .map(str::trim)
        .filter(|text| !text.is_empty())
}

fn required_text<'a>(node: Node<'a, '_>, tag: &str) -> Result<&'a str, CascadeParseError> {
    optional_text(node, tag).ok_or_else(|| CascadeParseError::Missing(tag.to_string()))
}

fn parse_number<T: std::str::FromStr>(node: Node<'_, '_>, tag: &str) -> Result<T, CascadeParseError> {
    let raw = required_text(node, tag)?;
    raw.parse::<T>().map_err(|_| invalid(tag, raw))
}

fn numbers<T: std::str::FromStr>(node: Node<'_, '_>, tag: &str) -> Result<Vec<T>, CascadeParseError> {
    let raw = required_text(node, tag)?;
    raw.split_whitespace()
        .map(|s| s.parse::<T>().map_err(|_| invalid(tag, raw)))
        .collect()
}

fn invalid(tag: &str, value: &str) -> CascadeParseError {
    CascadeParseError::Invalid {
        tag: tag.to_string(),
        value: value.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
