/// Lit mesh shader: Lambert shading of `base_color * texture` under one
/// ambient and one directional light.
///
/// Group 0 is per frame (camera + lights), group 1 per draw (transform +
/// material).
pub(super) const MESH_WGSL: &str = r#"
struct FrameUniform {
    view_proj: mat4x4<f32>,
    // xyz: direction towards the light (normalized)
    key_dir: vec4<f32>,
    // rgb: color * intensity
    key_color: vec4<f32>,
    ambient: vec4<f32>,
};

struct DrawUniform {
    model: mat4x4<f32>,
    normal_matrix: mat4x4<f32>,
    base_color: vec4<f32>,
};

@group(0) @binding(0) var<uniform> frame: FrameUniform;

@group(1) @binding(0) var<uniform> draw: DrawUniform;
@group(1) @binding(1) var base_tex: texture_2d<f32>;
@group(1) @binding(2) var base_sampler: sampler;

struct VsIn {
    @location(0) position: vec3<f32>,
    @location(1) normal: vec3<f32>,
    @location(2) uv: vec2<f32>,
};

struct VsOut {
    @builtin(position) clip: vec4<f32>,
    @location(0) normal: vec3<f32>,
    @location(1) uv: vec2<f32>,
};

@vertex
fn vs_main(in: VsIn) -> VsOut {
    var out: VsOut;
    let world = draw.model * vec4<f32>(in.position, 1.0);
    out.clip = frame.view_proj * world;
    out.normal = (draw.normal_matrix * vec4<f32>(in.normal, 0.0)).xyz;
    out.uv = in.uv;
    return out;
}

@fragment
fn fs_main(in: VsOut) -> @location(0) vec4<f32> {
    let albedo = draw.base_color * textureSample(base_tex, base_sampler, in.uv);
    var n = in.normal;
    if (dot(n, n) > 0.0) {
        n = normalize(n);
    }
    let diffuse = max(dot(n, frame.key_dir.xyz), 0.0);
    let light = frame.ambient.rgb + frame.key_color.rgb * diffuse;
    return vec4<f32>(min(albedo.rgb * light, vec3<f32>(1.0)), albedo.a);
}
"#;
