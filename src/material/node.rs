//! Node-based materials.
//!
//! A [`NodeMaterial`] describes each surface input (colour, roughness,
//! metalness, environment reflection) as a small expression tree of
//! [`ShaderNode`]s. The same tree is evaluated on the CPU (used by tests and
//! for picking sample values) and compiled to WGSL functions that the ground
//! pipeline splices into its shader template.

use std::{cell::Cell, fmt, fmt::Write as _, rc::Rc};

/// A scalar parameter shared between a material and whoever drives it.
///
/// Clones refer to the same cell, so a control bound to one clone is seen by
/// every material holding another.
#[derive(Clone, Debug)]
pub struct Uniform(Rc<Cell<f32>>);

impl Uniform {
    pub fn new(value: f32) -> Self {
        Self(Rc::new(Cell::new(value)))
    }

    pub fn get(&self) -> f32 {
        self.0.get()
    }

    pub fn set(&self, value: f32) {
        self.0.set(value)
    }

    pub fn same_cell(&self, other: &Uniform) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

#[derive(Clone, Debug)]
pub enum ScalarSource {
    Constant(f32),
    Uniform(Uniform),
}

impl ScalarSource {
    fn value(&self) -> f32 {
        match self {
            ScalarSource::Constant(value) => *value,
            ScalarSource::Uniform(uniform) => uniform.get(),
        }
    }
}

/// Textures a node material may sample. Bound by the renderer, not the material.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TextureSlot {
    /// The scene's prefiltered environment cube map.
    Environment,
}

#[derive(Clone, Debug)]
pub enum ShaderNode {
    /// Linear RGB.
    Color([f32; 3]),
    Scalar(ScalarSource),
    /// First texture coordinate set.
    Uv,
    /// World-space view direction reflected about the surface normal.
    ReflectVector,
    TextureSample {
        slot: TextureSlot,
        coord: Box<ShaderNode>,
    },
    Multiply(Box<ShaderNode>, Box<ShaderNode>),
    /// 1 on odd cells of the integer grid over a 2D coordinate, 0 on even ones.
    Checker(Box<ShaderNode>),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NodeType {
    Float,
    Vec2,
    Vec3,
}

impl NodeType {
    fn wgsl(self) -> &'static str {
        match self {
            NodeType::Float => "f32",
            NodeType::Vec2 => "vec2<f32>",
            NodeType::Vec3 => "vec3<f32>",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeTypeError {
    Mismatch {
        op: &'static str,
        left: NodeType,
        right: NodeType,
    },
    Expected {
        op: &'static str,
        expected: NodeType,
        found: NodeType,
    },
}

impl fmt::Display for NodeTypeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeTypeError::Mismatch { op, left, right } => {
                write!(f, "{op}: cannot combine {left:?} with {right:?}")
            }
            NodeTypeError::Expected { op, expected, found } => {
                write!(f, "{op}: expected {expected:?}, found {found:?}")
            }
        }
    }
}

impl std::error::Error for NodeTypeError {}

/// The value of a node evaluated on the CPU.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Value {
    Float(f32),
    Vec2([f32; 2]),
    Vec3([f32; 3]),
}

impl Value {
    pub fn as_float(self) -> Option<f32> {
        match self {
            Value::Float(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_vec3(self) -> Option<[f32; 3]> {
        match self {
            Value::Vec3(v) => Some(v),
            Value::Float(v) => Some([v; 3]),
            Value::Vec2(_) => None,
        }
    }

    fn multiply(self, rhs: Value) -> Value {
        use Value::*;
        match (self, rhs) {
            (Float(a), Float(b)) => Float(a * b),
            (Float(s), Vec2(v)) | (Vec2(v), Float(s)) => Vec2(v.map(|c| c * s)),
            (Float(s), Vec3(v)) | (Vec3(v), Float(s)) => Vec3(v.map(|c| c * s)),
            (Vec2(a), Vec2(b)) => Vec2([a[0] * b[0], a[1] * b[1]]),
            (Vec3(a), Vec3(b)) => Vec3([a[0] * b[0], a[1] * b[1], a[2] * b[2]]),
            // rejected by type checking
            (Vec2(_), Vec3(v)) | (Vec3(v), Vec2(_)) => Vec3(v),
        }
    }
}

/// Samples the textures named by [`TextureSlot`] during CPU evaluation.
pub trait SlotSampler {
    fn sample(&self, slot: TextureSlot, direction: [f32; 3], roughness: f32) -> [f32; 3];
}

/// Inputs available to a node at a surface point.
pub struct EvalContext<'a> {
    pub uv: [f32; 2],
    pub reflect: [f32; 3],
    pub roughness: f32,
    pub sampler: Option<&'a dyn SlotSampler>,
}

impl ShaderNode {
    pub fn color_hex(hex: u32) -> Self {
        let channel = |shift: u32| srgb_to_linear(((hex >> shift) & 0xff) as f32 / 255.0);
        ShaderNode::Color([channel(16), channel(8), channel(0)])
    }

    pub fn scalar(value: f32) -> Self {
        ShaderNode::Scalar(ScalarSource::Constant(value))
    }

    pub fn uniform(uniform: &Uniform) -> Self {
        ShaderNode::Scalar(ScalarSource::Uniform(uniform.clone()))
    }

    pub fn multiply(a: ShaderNode, b: ShaderNode) -> Self {
        ShaderNode::Multiply(Box::new(a), Box::new(b))
    }

    pub fn checker(coord: ShaderNode) -> Self {
        ShaderNode::Checker(Box::new(coord))
    }

    pub fn environment(coord: ShaderNode) -> Self {
        ShaderNode::TextureSample {
            slot: TextureSlot::Environment,
            coord: Box::new(coord),
        }
    }

    pub fn output_type(&self) -> Result<NodeType, NodeTypeError> {
        match self {
            ShaderNode::Color(_) | ShaderNode::ReflectVector => Ok(NodeType::Vec3),
            ShaderNode::Scalar(_) => Ok(NodeType::Float),
            ShaderNode::Uv => Ok(NodeType::Vec2),
            ShaderNode::TextureSample { coord, .. } => {
                expect_type("texture sample", coord, NodeType::Vec3)?;
                Ok(NodeType::Vec3)
            }
            ShaderNode::Multiply(a, b) => {
                let (left, right) = (a.output_type()?, b.output_type()?);
                match (left, right) {
                    (l, r) if l == r => Ok(l),
                    (NodeType::Float, other) | (other, NodeType::Float) => Ok(other),
                    _ => Err(NodeTypeError::Mismatch {
                        op: "multiply",
                        left,
                        right,
                    }),
                }
            }
            ShaderNode::Checker(coord) => {
                expect_type("checker", coord, NodeType::Vec2)?;
                Ok(NodeType::Float)
            }
        }
    }

    pub fn evaluate(&self, ctx: &EvalContext) -> Value {
        match self {
            ShaderNode::Color(rgb) => Value::Vec3(*rgb),
            ShaderNode::Scalar(source) => Value::Float(source.value()),
            ShaderNode::Uv => Value::Vec2(ctx.uv),
            ShaderNode::ReflectVector => Value::Vec3(ctx.reflect),
            ShaderNode::TextureSample { slot, coord } => {
                let direction = coord.evaluate(ctx).as_vec3().unwrap_or(ctx.reflect);
                let rgb = ctx
                    .sampler
                    .map(|sampler| sampler.sample(*slot, direction, ctx.roughness))
                    .unwrap_or([0.0; 3]);
                Value::Vec3(rgb)
            }
            ShaderNode::Multiply(a, b) => a.evaluate(ctx).multiply(b.evaluate(ctx)),
            ShaderNode::Checker(coord) => match coord.evaluate(ctx) {
                Value::Vec2([x, y]) => Value::Float(checker(x, y)),
                Value::Float(v) => Value::Float(checker(v, v)),
                Value::Vec3([x, y, _]) => Value::Float(checker(x, y)),
            },
        }
    }

    /// Collects every uniform cell in the tree, in pre-order, without duplicates.
    fn collect_uniforms(&self, out: &mut Vec<Uniform>) {
        match self {
            ShaderNode::Scalar(ScalarSource::Uniform(uniform)) => {
                if !out.iter().any(|u| u.same_cell(uniform)) {
                    out.push(uniform.clone());
                }
            }
            ShaderNode::TextureSample { coord, .. } | ShaderNode::Checker(coord) => {
                coord.collect_uniforms(out)
            }
            ShaderNode::Multiply(a, b) => {
                a.collect_uniforms(out);
                b.collect_uniforms(out);
            }
            _ => {}
        }
    }

    fn to_wgsl(&self, uniforms: &[Uniform]) -> String {
        match self {
            ShaderNode::Color([r, g, b]) => format!("vec3<f32>({r:?}, {g:?}, {b:?})"),
            ShaderNode::Scalar(ScalarSource::Constant(value)) => format!("{value:?}"),
            ShaderNode::Scalar(ScalarSource::Uniform(uniform)) => {
                let index = uniforms
                    .iter()
                    .position(|u| u.same_cell(uniform))
                    .unwrap_or_default();
                format!("node_params.values[{}][{}]", index / 4, index % 4)
            }
            ShaderNode::Uv => "inputs.uv".to_string(),
            ShaderNode::ReflectVector => "inputs.reflect_dir".to_string(),
            ShaderNode::TextureSample {
                slot: TextureSlot::Environment,
                coord,
            } => format!(
                "sample_environment({}, inputs.roughness)",
                coord.to_wgsl(uniforms)
            ),
            ShaderNode::Multiply(a, b) => {
                format!("({} * {})", a.to_wgsl(uniforms), b.to_wgsl(uniforms))
            }
            ShaderNode::Checker(coord) => format!("node_checker({})", coord.to_wgsl(uniforms)),
        }
    }
}

fn expect_type(op: &'static str, node: &ShaderNode, expected: NodeType) -> Result<(), NodeTypeError> {
    let found = node.output_type()?;
    if found == expected {
        Ok(())
    } else {
        Err(NodeTypeError::Expected { op, expected, found })
    }
}

/// `sign(mod(floor(x) + floor(y), 2))`
pub fn checker(x: f32, y: f32) -> f32 {
    (x.floor() + y.floor()).rem_euclid(2.0)
}

pub fn srgb_to_linear(c: f32) -> f32 {
    if c <= 0.04045 {
        c / 12.92
    } else {
        ((c + 0.055) / 1.055).powf(2.4)
    }
}

/// A material whose inputs are expression trees.
#[derive(Clone, Debug)]
pub struct NodeMaterial {
    pub name: String,
    pub color: ShaderNode,
    pub roughness: ShaderNode,
    pub metalness: ShaderNode,
    pub environment: Option<ShaderNode>,
}

impl Default for NodeMaterial {
    fn default() -> Self {
        Self {
            name: "node".to_string(),
            color: ShaderNode::Color([1.0; 3]),
            roughness: ShaderNode::scalar(0.5),
            metalness: ShaderNode::scalar(0.0),
            environment: None,
        }
    }
}

/// Per-point result of evaluating all material inputs.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SurfaceSample {
    pub color: [f32; 3],
    pub roughness: f32,
    pub metalness: f32,
    pub environment: [f32; 3],
}

impl NodeMaterial {
    pub fn validate(&self) -> Result<(), NodeTypeError> {
        expect_type("color", &self.color, NodeType::Vec3)
            .or_else(|_| expect_type("color", &self.color, NodeType::Float))?;
        expect_type("roughness", &self.roughness, NodeType::Float)?;
        expect_type("metalness", &self.metalness, NodeType::Float)?;
        if let Some(environment) = &self.environment {
            expect_type("environment", environment, NodeType::Vec3)?;
        }
        Ok(())
    }

    /// Every uniform the material reads, in the order they are packed by [`Self::uniform_data`].
    pub fn uniforms(&self) -> Vec<Uniform> {
        let mut out = Vec::new();
        self.color.collect_uniforms(&mut out);
        self.roughness.collect_uniforms(&mut out);
        self.metalness.collect_uniforms(&mut out);
        if let Some(environment) = &self.environment {
            environment.collect_uniforms(&mut out);
        }
        out
    }

    /// Current uniform values packed four to a `vec4`. Never empty.
    pub fn uniform_data(&self) -> Vec<[f32; 4]> {
        let uniforms = self.uniforms();
        let mut packed = vec![[0.0; 4]; uniforms.len().div_ceil(4).max(1)];
        for (i, uniform) in uniforms.iter().enumerate() {
            packed[i / 4][i % 4] = uniform.get();
        }
        packed
    }

    pub fn sample(&self, uv: [f32; 2], reflect: [f32; 3], sampler: Option<&dyn SlotSampler>) -> SurfaceSample {
        let mut ctx = EvalContext {
            uv,
            reflect,
            roughness: 0.0,
            sampler,
        };
        let roughness = self.roughness.evaluate(&ctx).as_float().unwrap_or(0.0);
        ctx.roughness = roughness;
        SurfaceSample {
            color: self.color.evaluate(&ctx).as_vec3().unwrap_or([0.0; 3]),
            roughness,
            metalness: self.metalness.evaluate(&ctx).as_float().unwrap_or(0.0),
            environment: self
                .environment
                .as_ref()
                .and_then(|node| node.evaluate(&ctx).as_vec3())
                .unwrap_or([0.0; 3]),
        }
    }

    /// WGSL for the material's input functions and its parameter block.
    ///
    /// The generated code expects the template to declare a `NodeInputs`
    /// struct (`uv`, `reflect_dir`, `roughness`) and the helpers
    /// `node_checker` and `sample_environment`.
    pub fn to_wgsl(&self) -> Result<String, NodeTypeError> {
        self.validate()?;
        let uniforms = self.uniforms();
        let slots = uniforms.len().div_ceil(4).max(1);
        let mut src = String::new();
        let _ = writeln!(src, "struct NodeParams {{ values: array<vec4<f32>, {slots}>, }};");
        let _ = writeln!(src, "@group(2) @binding(0) var<uniform> node_params: NodeParams;");

        let color = match self.color.output_type()? {
            NodeType::Float => format!("vec3<f32>({})", self.color.to_wgsl(&uniforms)),
            _ => self.color.to_wgsl(&uniforms),
        };
        let environment = self
            .environment
            .as_ref()
            .map(|node| node.to_wgsl(&uniforms))
            .unwrap_or_else(|| "vec3<f32>(0.0)".to_string());
        for (name, ty, body) in [
            ("node_color", NodeType::Vec3, color),
            ("node_roughness", NodeType::Float, self.roughness.to_wgsl(&uniforms)),
            ("node_metalness", NodeType::Float, self.metalness.to_wgsl(&uniforms)),
            ("node_environment", NodeType::Vec3, environment),
        ] {
            let _ = writeln!(
                src,
                "fn {name}(inputs: NodeInputs) -> {} {{\n    return {body};\n}}",
                ty.wgsl()
            );
        }
        Ok(src)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ground(uv_scale: &Uniform) -> NodeMaterial {
        NodeMaterial {
            name: "ground".to_string(),
            color: ShaderNode::color_hex(0xaaaaaa),
            roughness: ShaderNode::checker(ShaderNode::multiply(ShaderNode::Uv, ShaderNode::uniform(uv_scale))),
            metalness: ShaderNode::scalar(0.0),
            environment: Some(ShaderNode::multiply(
                ShaderNode::environment(ShaderNode::ReflectVector),
                ShaderNode::scalar(1.0),
            )),
        }
    }

    /// Counts how often the roughness flips along one row of the unit square.
    fn cells_along_u(material: &NodeMaterial) -> usize {
        let samples = 600;
        let mut last = None;
        let mut cells = 0;
        for i in 0..samples {
            let u = (i as f32 + 0.5) / samples as f32;
            let value = material.sample([u, 0.01], [0.0, 1.0, 0.0], None).roughness;
            if last != Some(value) {
                cells += 1;
                last = Some(value);
            }
        }
        cells
    }

    #[test]
    fn checker_alternates_between_zero_and_one() {
        assert_eq!(checker(0.5, 0.5), 0.0);
        assert_eq!(checker(1.5, 0.5), 1.0);
        assert_eq!(checker(1.5, 1.5), 0.0);
        assert_eq!(checker(-0.5, 0.5), 1.0);
    }

    #[test]
    fn uv_scale_sets_the_number_of_checker_cells() {
        let uv_scale = Uniform::new(6.0);
        let material = ground(&uv_scale);
        assert_eq!(cells_along_u(&material), 6);

        uv_scale.set(12.0);
        assert_eq!(cells_along_u(&material), 12);
    }

    #[test]
    fn ground_material_type_checks() {
        let material = ground(&Uniform::new(6.0));
        assert!(material.validate().is_ok());
        let bad = NodeMaterial {
            roughness: ShaderNode::checker(ShaderNode::ReflectVector),
            ..material
        };
        assert!(matches!(
            bad.validate(),
            Err(NodeTypeError::Expected { op: "checker", .. })
        ));
    }

    #[test]
    fn uniforms_are_deduplicated_and_packed() {
        let uv_scale = Uniform::new(6.0);
        let mut material = ground(&uv_scale);
        material.metalness = ShaderNode::uniform(&uv_scale);
        assert_eq!(material.uniforms().len(), 1);
        assert_eq!(material.uniform_data(), vec![[6.0, 0.0, 0.0, 0.0]]);
    }

    #[test]
    fn environment_is_scaled_sample() {
        struct Flat;
        impl SlotSampler for Flat {
            fn sample(&self, _: TextureSlot, _: [f32; 3], _: f32) -> [f32; 3] {
                [0.25, 0.5, 1.0]
            }
        }
        let material = ground(&Uniform::new(6.0));
        let sample = material.sample([0.1, 0.1], [0.0, 1.0, 0.0], Some(&Flat));
        assert_eq!(sample.environment, [0.25, 0.5, 1.0]);
    }

    #[test]
    fn wgsl_reads_uniform_from_param_block() {
        let material = ground(&Uniform::new(6.0));
        let wgsl = material.to_wgsl().unwrap();
        assert!(wgsl.contains("node_checker((inputs.uv * node_params.values[0][0]))"));
        assert!(wgsl.contains("fn node_environment(inputs: NodeInputs) -> vec3<f32>"));
        assert!(wgsl.contains("array<vec4<f32>, 1>"));
    }
}
