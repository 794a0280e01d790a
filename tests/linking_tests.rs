//! Annotation-driven linking of parameters, textures and pass targets.

mod common;

use std::sync::Arc;

use glam::Vec4;
use rstest::rstest;

use common::{png_bytes, TestContext};
use fxinject::backend::{
    DummyBackend, EffectBackend, NativeValue, ParameterDesc, TextureDescriptor, TextureFormat,
    TextureKind, TextureUsage,
};
use fxinject::{BindingArgument, FxError, ParameterQuery, Resource};

#[test]
fn test_missing_texture_leaves_parameter_unbound() {
    let ctx = TestContext::new();
    let effect = ctx.compile(
        r#"
        texture2D detail < string texture = "nowhere"; >;
        technique t { pass p { } }
        "#,
    );

    let detail = effect.parameter_by_name("detail").unwrap();
    assert!(detail.get_texture().unwrap().is_none());
    assert!(ctx.core.get_texture("nowhere").is_none());
    assert_eq!(ctx.backend.texture_count(), 0);
    assert_eq!(effect.technique_count(), 1);
}

#[test]
fn test_unknown_format_leaves_parameter_unbound() {
    let ctx = TestContext::new();
    let effect = ctx.compile(
        r#"
        texture2D detail < string texture = "odd"; string format = "X4R4G4B4"; >;
        technique t { pass p { } }
        "#,
    );

    assert!(effect.parameter_by_name("detail").unwrap().get_texture().unwrap().is_none());
    assert!(ctx.core.get_texture("odd").is_none());
}

#[test]
fn test_existing_texture_is_bound() {
    let ctx = TestContext::new();
    let noise = ctx
        .core
        .create_texture("noise", &TextureDescriptor::new_2d(32, 32, TextureFormat::R8Unorm))
        .unwrap();

    let effect = ctx.compile(
        r#"
        sampler2D noise_sampler < string texture = "noise"; >;
        technique t { pass p { } }
        "#,
    );

    let parameter = effect.parameter_by_name("noise_sampler").unwrap();
    let bound = parameter.get_texture().unwrap().unwrap();
    assert!(Arc::ptr_eq(&bound, &noise));
    assert_eq!(
        parameter.read_native().unwrap(),
        NativeValue::Texture(noise.native_handle())
    );
}

#[rstest]
#[case::cube("float size = 128;", TextureKind::Cube, (128, 128, 1))]
#[case::flat("float2 size = { 320, 240 };", TextureKind::D2, (320, 240, 1))]
#[case::volume("float3 size = { 16, 8, 4 };", TextureKind::Volume, (16, 8, 4))]
#[case::backbuffer("", TextureKind::D2, (1280, 720, 1))]
fn test_texture_synthesized_from_annotations(
    #[case] size: &str,
    #[case] kind: TextureKind,
    #[case] extent: (u32, u32, u32),
) {
    let ctx = TestContext::new();
    let source = format!(
        r#"
        texture target < string texture = "made"; string format = "A16B16G16R16F"; {size} >;
        technique t {{ pass p {{ }} }}
        "#
    );
    let effect = ctx.compile(&source);

    let texture = ctx.core.get_texture("made").unwrap();
    let desc = texture.descriptor();
    assert_eq!(desc.kind, kind);
    assert_eq!((desc.size.width, desc.size.height, desc.size.depth), extent);
    assert_eq!(desc.format, TextureFormat::Rgba16Float);
    assert_eq!(desc.mip_levels, 1);
    assert!(desc.usage.contains(TextureUsage::RENDER_ATTACHMENT));

    let bound = effect.parameter_by_name("target").unwrap().get_texture().unwrap();
    assert!(Arc::ptr_eq(&bound.unwrap(), &texture));
}

#[test]
fn test_synthesized_texture_options() {
    let ctx = TestContext::new();
    ctx.compile(
        r#"
        texture lut < string texture = "lut"; string format = "R32F"; float2 size = { 256, 64 };
                      bool mipmaps = true; bool rendertarget = false; >;
        technique t { pass p { } }
        "#,
    );

    let lut = ctx.core.get_texture("lut").unwrap();
    assert_eq!(lut.descriptor().mip_levels, 9);
    assert!(!lut.descriptor().is_render_target());
    assert!(lut.descriptor().usage.contains(TextureUsage::AUTOGEN_MIPMAPS));
}

#[test]
fn test_fallback_size_without_backbuffer() {
    let ctx = TestContext::with_backend(
        DummyBackend::new().with_backbuffer_size(None),
        fxinject::CoreConfig::default().with_fallback_texture_size(512, 256),
    );
    ctx.compile(
        r#"
        texture rt < string texture = "rt"; string format = "A8R8G8B8"; >;
        technique t { pass p { } }
        "#,
    );

    let rt = ctx.core.get_texture("rt").unwrap();
    assert_eq!((rt.width(), rt.height()), (512, 256));
}

#[test]
fn test_texture_loaded_from_file() {
    let ctx = TestContext::new();
    ctx.add_file("textures/albedo.png", png_bytes(4, 2, [255, 0, 0, 255]));

    let effect = ctx.compile(
        r#"
        texture2D albedo < string texture = "albedo"; string file = "textures/albedo.png"; >;
        technique t { pass p { } }
        "#,
    );

    let texture = effect.parameter_by_name("albedo").unwrap().get_texture().unwrap().unwrap();
    assert_eq!(texture.name(), "albedo");
    assert_eq!((texture.width(), texture.height()), (4, 2));
    assert_eq!(texture.descriptor().format, TextureFormat::Rgba8Unorm);
    assert_eq!(texture.source_file(), Some("memory:textures/albedo.png"));
    assert_eq!(ctx.backend.uploaded_bytes(texture.native_handle().unwrap()), Some(32));
}

#[test]
fn test_undecodable_texture_file() {
    let ctx = TestContext::new();
    ctx.add_file("textures/broken.png", b"not a png".to_vec());

    assert!(matches!(
        ctx.core.load_texture("broken", "textures/broken.png"),
        Err(FxError::ApiError(_))
    ));
    assert!(ctx.core.get_texture("broken").is_none());
    assert_eq!(ctx.backend.texture_count(), 0);
}

#[test]
fn test_source_creates_global_seeded_from_default() {
    let ctx = TestContext::new();
    let effect = ctx.compile(
        r#"
        float4 tint < string source = "global.tint"; > = { 1, 0.5, 0.25, 1 };
        technique t { pass p { } }
        "#,
    );
    let tint = effect.parameter_by_name("tint").unwrap();

    let global = ctx.core.get_parameter("global.tint", ParameterDesc::float(4)).unwrap();
    assert!(!global.is_hardware_backed());
    assert_eq!(global.get_vector().unwrap(), Vec4::new(1.0, 0.5, 0.25, 1.0));
    assert!(Arc::ptr_eq(&tint.link_source().unwrap(), &global));

    let value = Vec4::new(0.1, 0.2, 0.3, 0.4);
    global.set_vector(value).unwrap();
    assert_eq!(tint.get_vector().unwrap(), value);
    assert_eq!(tint.read_native().unwrap(), NativeValue::Float(value));

    // Propagation is directed: the effect's own parameter does not feed back.
    tint.set_vector(Vec4::ONE).unwrap();
    assert_eq!(global.get_vector().unwrap(), value);
}

#[test]
fn test_source_seeds_child_from_existing_global() {
    let ctx = TestContext::new();
    let global = ctx.core.create_parameter("global.exposure", ParameterDesc::float(1)).unwrap();
    global.set_float(2.0).unwrap();

    let effect = ctx.compile(
        r#"
        float exposure < string source = "global.exposure"; > = 1.0;
        technique t { pass p { } }
        "#,
    );

    let exposure = effect.parameter_by_name("exposure").unwrap();
    assert_eq!(exposure.get_float().unwrap(), 2.0);
    assert_eq!(global.get_float().unwrap(), 2.0);
    assert_eq!(global.attached().len(), 1);
}

#[test]
fn test_source_with_mismatched_type_is_not_linked() {
    let ctx = TestContext::new();
    let global = ctx.core.create_parameter("global.flag", ParameterDesc::int()).unwrap();

    let effect = ctx.compile(
        r#"
        bool flag < string source = "global.flag"; >;
        technique t { pass p { } }
        "#,
    );

    let flag = effect.parameter_by_name("flag").unwrap();
    assert!(flag.link_source().is_none());
    assert!(global.attached().is_empty());
    assert!(ctx.core.get_parameter("global.flag", ParameterQuery::any()).is_some());
}

#[test]
fn test_global_shared_between_effects() {
    let ctx = TestContext::new();
    let source = r#"
        float time < string source = "global.time"; >;
        technique t { pass p { } }
    "#;
    let first = ctx.compile(source);
    let second = ctx.compile(source);

    let global = ctx.core.get_parameter("global.time", ParameterQuery::any()).unwrap();
    assert_eq!(global.attached().len(), 2);

    global.set_float(4.5).unwrap();
    for effect in [&first, &second] {
        assert_eq!(effect.parameter_by_name("time").unwrap().get_float().unwrap(), 4.5);
    }

    drop(first);
    assert_eq!(global.attached().len(), 1);
    global.set_float(5.0).unwrap();
    assert_eq!(second.parameter_by_name("time").unwrap().get_float().unwrap(), 5.0);
}

#[test]
fn test_pass_targets_resolve_synthesized_textures() {
    let ctx = TestContext::new();
    let effect = ctx.compile(
        r#"
        texture scene < string texture = "scene_rt"; string format = "A8R8G8B8";
                        float2 size = { 320, 240 }; >;
        technique t
        {
            pass draw < string target0 = "scene_rt"; string target1 = "backbuffer"; > { }
        }
        "#,
    );
    let backbuffer = ctx.binding.create_null_texture().unwrap();

    let technique = effect.default_technique().unwrap();
    let pass = technique.pass(0).unwrap();
    let scene = ctx.core.get_texture("scene_rt").unwrap();
    assert!(Arc::ptr_eq(&pass.get_target(0).unwrap().unwrap(), &scene));
    assert!(pass.get_target(1).unwrap().is_none());

    pass.set_target(1, Some(backbuffer)).unwrap();

    effect.bind(true).unwrap();
    pass.bind().unwrap();
    let state = ctx.backend.capture_state();
    assert_eq!(state.targets[0], scene.native_handle());
    assert_eq!(state.targets[1], None);
    pass.reset().unwrap();
    effect.reset().unwrap();

    assert_eq!(ctx.backend.capture_state().targets[0], None);
}

#[test]
fn test_shared_texture_between_effects() {
    let ctx = TestContext::new();
    let source = r#"
        texture shared < string texture = "shared_rt"; string format = "A8R8G8B8"; >;
        technique t { pass p { } }
    "#;
    let first = ctx.compile(source);
    let second = ctx.compile(source);

    let a = first.parameter_by_name("shared").unwrap().get_texture().unwrap().unwrap();
    let b = second.parameter_by_name("shared").unwrap().get_texture().unwrap().unwrap();
    assert!(Arc::ptr_eq(&a, &b));
    assert_eq!(ctx.backend.texture_count(), 1);
}

#[test]
fn test_registry_textures_follow_the_device_across_reinit() {
    let ctx = TestContext::new();
    let source = r#"
        texture scene < string texture = "scene_rt"; string format = "A8R8G8B8";
                        float2 size = { 128, 128 }; >;
        technique t { pass draw < string target0 = "scene_rt"; > { } }
    "#;
    let old_effect = ctx.compile(source);
    let old_scene = ctx.core.get_texture("scene_rt").unwrap();

    ctx.binding.reset();
    let device = Arc::new(DummyBackend::new());
    ctx.binding
        .init(&[BindingArgument::Device(device.clone())])
        .unwrap();
    assert!(!old_scene.is_valid());
    assert!(ctx.core.get_texture("scene_rt").is_none());

    let effect = ctx.compile(source);
    let scene = effect.parameter_by_name("scene").unwrap().get_texture().unwrap().unwrap();
    assert!(scene.is_valid());
    assert!(!Arc::ptr_eq(&scene, &old_scene));
    assert!(Arc::ptr_eq(&ctx.core.get_texture("scene_rt").unwrap(), &scene));
    assert_eq!(device.texture_count(), 1);

    let technique = effect.bind(false).unwrap();
    let pass = technique.pass(0).unwrap();
    assert!(Arc::ptr_eq(&pass.get_target(0).unwrap().unwrap(), &scene));
    pass.bind().unwrap();
    assert_eq!(device.capture_state().targets[0], scene.native_handle());
    pass.reset().unwrap();
    effect.reset().unwrap();
    drop(old_effect);
}
