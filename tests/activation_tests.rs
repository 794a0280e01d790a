//! Activation state machine and render state restoration.

mod common;

use rstest::rstest;

use common::{TestContext, TWO_TECHNIQUES};
use fxinject::backend::{EffectBackend, TextureDescriptor, TextureFormat};
use fxinject::{BindingArgument, FxError, Resource};

#[test]
fn test_effect_bind_twice_fails() {
    let ctx = TestContext::new();
    let effect = ctx.compile(TWO_TECHNIQUES);

    let technique = effect.bind(false).unwrap();
    assert_eq!(technique.name(), "basic");
    assert!(effect.is_active());

    assert!(matches!(effect.bind(false), Err(FxError::InvalidCall(_))));
    assert!(ctx.binding.has_active_effect());
    assert!(!ctx.binding.has_active_pass());

    effect.reset().unwrap();
    assert!(!ctx.binding.has_active_effect());
    assert!(matches!(effect.reset(), Err(FxError::InvalidCall(_))));
}

#[test]
fn test_pass_bind_requires_active_effect() {
    let ctx = TestContext::new();
    let effect = ctx.compile(TWO_TECHNIQUES);
    let technique = effect.default_technique().unwrap();
    let pass = technique.pass(0).unwrap();

    assert!(matches!(pass.bind(), Err(FxError::InvalidCall(_))));
    assert!(!ctx.binding.has_active_pass());
    assert!(matches!(pass.reset(), Err(FxError::InvalidCall(_))));
}

#[test]
fn test_only_one_effect_active() {
    let ctx = TestContext::new();
    let first = ctx.compile(TWO_TECHNIQUES);
    let second = ctx.compile(TWO_TECHNIQUES);

    first.bind(false).unwrap();
    assert!(matches!(second.bind(false), Err(FxError::InvalidCall(_))));

    // Passes of an inactive effect cannot be entered either.
    let foreign_pass = second.default_technique().unwrap().pass(0).unwrap().clone();
    assert!(matches!(foreign_pass.bind(), Err(FxError::InvalidCall(_))));
    assert!(!ctx.binding.has_active_pass());

    first.reset().unwrap();
    second.bind(false).unwrap();
    second.reset().unwrap();
}

#[test]
fn test_passes_are_strictly_nested() {
    let ctx = TestContext::new();
    let effect = ctx.compile(TWO_TECHNIQUES);
    let technique = effect.bind(false).unwrap();
    let p0 = technique.pass(0).unwrap();
    let p1 = technique.pass(1).unwrap();

    p0.bind().unwrap();
    assert!(ctx.binding.has_active_pass());
    assert!(matches!(p1.bind(), Err(FxError::InvalidCall(_))));
    assert!(matches!(p1.reset(), Err(FxError::InvalidCall(_))));

    p0.reset().unwrap();
    p1.bind().unwrap();
    p1.reset().unwrap();
    assert!(!ctx.binding.has_active_pass());

    effect.reset().unwrap();
}

#[test]
fn test_reset_ends_dangling_pass() {
    let ctx = TestContext::new();
    let effect = ctx.compile(TWO_TECHNIQUES);
    let technique = effect.bind(false).unwrap();

    technique.pass(0).unwrap().bind().unwrap();
    effect.reset().unwrap();
    assert!(!ctx.binding.has_active_pass());
    assert!(!ctx.binding.has_active_effect());

    // The native effect was ended cleanly and can begin again.
    effect.bind(false).unwrap();
    effect.reset().unwrap();
}

#[test]
fn test_clean_bind_restores_host_state() {
    let ctx = TestContext::new();
    let effect = ctx.compile(TWO_TECHNIQUES);

    ctx.backend.set_render_state("CullMode", 3);
    ctx.backend.set_render_state("FillMode", 2);
    let before = ctx.backend.capture_state();

    let technique = effect.bind(true).unwrap();
    // Shaders start from the baseline captured at init.
    assert_eq!(ctx.backend.render_state_value("CullMode"), None);
    assert_eq!(ctx.binding.state_depth(), 1);

    for pass in technique.passes() {
        pass.bind().unwrap();
        pass.reset().unwrap();
    }
    assert_eq!(ctx.backend.render_state_value("CullMode"), Some(2));
    assert_eq!(ctx.backend.render_state_value("AlphaBlendEnable"), Some(1));

    effect.reset().unwrap();
    assert_eq!(ctx.backend.capture_state(), before);
    assert_eq!(ctx.binding.state_depth(), 0);
}

#[test]
fn test_unclean_bind_keeps_pass_state() {
    let ctx = TestContext::new();
    let effect = ctx.compile(TWO_TECHNIQUES);
    ctx.backend.set_render_state("CullMode", 3);

    let technique = effect.bind(false).unwrap();
    assert_eq!(ctx.backend.render_state_value("CullMode"), Some(3));
    technique.pass(0).unwrap().bind().unwrap();
    technique.pass(0).unwrap().reset().unwrap();
    effect.reset().unwrap();

    assert_eq!(ctx.backend.render_state_value("CullMode"), Some(2));
    assert_eq!(ctx.binding.state_depth(), 0);
}

#[rstest]
#[case::clean(true)]
#[case::unclean(false)]
fn test_binding_reset_invalidates_effects(#[case] clean: bool) {
    let ctx = TestContext::new();
    let effect = ctx.compile(TWO_TECHNIQUES);
    effect.bind(clean).unwrap();

    ctx.binding.reset();
    assert!(!ctx.binding.has_active_effect());
    assert!(!effect.is_valid());
    assert!(matches!(effect.bind(clean), Err(FxError::InvalidCall(_))));

    ctx.binding
        .init(&[BindingArgument::Device(ctx.backend.clone())])
        .unwrap();
    assert!(!effect.is_valid());
    assert!(matches!(effect.bind(clean), Err(FxError::InvalidCall(_))));

    // Effects compiled after re-init work.
    let fresh = ctx.compile(TWO_TECHNIQUES);
    fresh.bind(clean).unwrap();
    fresh.reset().unwrap();
}

#[test]
fn test_dropping_active_effect_unbinds() {
    let ctx = TestContext::new();
    let effect = ctx.compile(TWO_TECHNIQUES);
    ctx.backend.set_render_state("CullMode", 3);

    effect.bind(true).unwrap();
    drop(effect);

    assert!(!ctx.binding.has_active_effect());
    assert_eq!(ctx.backend.render_state_value("CullMode"), Some(3));
    assert_eq!(ctx.binding.effect_count(), 0);
}

#[test]
fn test_effect_without_technique_cannot_bind() {
    let ctx = TestContext::new();
    let effect = ctx.compile("technique modern < int shader_model = 9; > { pass p { } }");

    assert_eq!(effect.technique_count(), 0);
    assert!(effect.default_technique().is_none());
    assert!(matches!(effect.bind(true), Err(FxError::InvalidCall(_))));
    assert_eq!(ctx.binding.state_depth(), 0);
}

#[rstest]
#[case::clean(true)]
#[case::unclean(false)]
fn test_rejected_pass_leaves_device_state(#[case] clean: bool) {
    let ctx = TestContext::new();
    ctx.core
        .create_texture("lut", &TextureDescriptor::new_2d(16, 16, TextureFormat::Rgba8Unorm))
        .unwrap();
    let effect = ctx.compile(
        r#"
        texture scene < string texture = "scene_rt"; string format = "A8R8G8B8";
                        float2 size = { 64, 64 }; >;
        technique t
        {
            pass draw < string target0 = "scene_rt"; string target1 = "lut"; > { CullMode = 2; }
        }
        "#,
    );
    ctx.backend.set_render_state("CullMode", 3);

    let technique = effect.bind(clean).unwrap();
    let pass = technique.pass(0).unwrap();
    assert!(pass.get_target(0).unwrap().is_some());
    assert!(pass.get_target(1).unwrap().is_some());

    let before = ctx.backend.capture_state();
    assert!(matches!(pass.bind(), Err(FxError::ApiError(_))));
    assert!(!ctx.binding.has_active_pass());
    assert_eq!(ctx.backend.capture_state(), before);

    effect.reset().unwrap();
    assert_eq!(ctx.backend.capture_state().targets, [None; 4]);
    assert_eq!(ctx.backend.render_state_value("CullMode"), Some(3));
}

#[test]
fn test_binding_reset_restores_host_state_of_clean_effect() {
    let ctx = TestContext::new();
    let effect = ctx.compile(TWO_TECHNIQUES);
    ctx.backend.set_render_state("CullMode", 3);
    let before = ctx.backend.capture_state();

    let technique = effect.bind(true).unwrap();
    technique.pass(0).unwrap().bind().unwrap();
    assert_eq!(ctx.backend.render_state_value("CullMode"), Some(2));

    ctx.binding.reset();
    assert_eq!(ctx.backend.capture_state(), before);
    assert_eq!(ctx.binding.state_depth(), 0);
}
