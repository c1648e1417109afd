mod common;

use cgmath::{Matrix4, Point3, SquareMatrix, Vector3, Vector4};
use common::test_utils::{FakeProgram, RecordingApi, assert_near};
use flow_demos::{
    gpu::UniformLocation,
    pipelines::{
        forward::lit_program,
        light::{LightTable, PointLight},
    },
};

fn light_program(count: usize) -> FakeProgram {
    let names: Vec<String> = (0..count)
        .flat_map(|i| [format!("lights[{i}].pos"), format!("lights[{i}].color")])
        .collect();
    let refs: Vec<&str> = names.iter().map(String::as_str).collect();
    FakeProgram::new("Deferred/Light", &refs)
}

#[test]
fn ring_spaces_lights_evenly() {
    let lights = PointLight::ring(10, 4.0, 0.1);
    assert_eq!(lights.len(), 10);

    assert_near(lights[0].position.x, 0.0);
    assert_near(lights[0].position.z, 4.0);
    for light in &lights {
        let p = light.position;
        assert_near((p.x * p.x + p.z * p.z).sqrt(), 4.0);
        assert_near(p.y, 0.1);
        assert_near(p.w, 1.0);
        assert_eq!(light.color, Vector4::new(1.0, 1.0, 1.0, 1.0));
    }
    // opposite sides of the ring
    assert_near(lights[5].position.z, -4.0);
}

#[test]
fn table_resolves_every_light() {
    let api = RecordingApi::new();
    let table = LightTable::resolve(&api, &light_program(10), 10);
    assert_eq!(table.len(), 10);
    assert!(!table.is_empty());
}

#[test]
fn upload_writes_view_space_positions_and_colours() {
    let mut api = RecordingApi::new();
    let table = LightTable::resolve(&api, &light_program(2), 2);
    let lights = vec![
        PointLight {
            position: Vector4::new(1.0, 0.0, 0.0, 1.0),
            color: Vector4::new(1.0, 0.0, 0.0, 1.0),
        },
        PointLight::default(),
    ];
    let view = Matrix4::from_translation(Vector3::new(0.0, 0.0, -5.0));

    table.upload(&mut api, &lights, &view);

    assert_eq!(
        api.vec4_uploads(UniformLocation(0)),
        vec![Vector4::new(1.0, 0.0, -5.0, 1.0)]
    );
    assert_eq!(
        api.vec4_uploads(UniformLocation(1)),
        vec![Vector4::new(1.0, 0.0, 0.0, 1.0)]
    );
    assert_eq!(
        api.vec4_uploads(UniformLocation(2)),
        vec![Vector4::new(0.0, 0.0, -5.0, 1.0)]
    );
}

#[test]
fn single_light_may_use_the_plain_struct_name() {
    let mut api = RecordingApi::new();
    let program = FakeProgram::new("Single", &["light.pos", "light.color"]);

    let table = LightTable::resolve(&api, &program, 1);
    table.upload(&mut api, &[PointLight::default()], &Matrix4::identity());

    assert_eq!(api.vec4_uploads(UniformLocation(0)).len(), 1);
    assert_eq!(api.vec4_uploads(UniformLocation(1)).len(), 1);
}

#[test]
fn unresolved_lights_upload_nothing() {
    let mut api = RecordingApi::new();
    let program = FakeProgram::new("Empty", &["modelMat"]);
    let table = LightTable::resolve(&api, &program, 3);

    table.upload(&mut api, &PointLight::ring(3, 1.0, 0.0), &Matrix4::identity());

    assert!(api.calls.is_empty());
}

#[test]
fn forward_light_is_uploaded_in_view_space() {
    let desc = lit_program();
    let names: Vec<&str> = desc.uniforms.entries().iter().map(|e| e.name.as_str()).collect();
    let program = FakeProgram::new("Forward/Lit", &names);
    let mut api = RecordingApi::new();

    let table = LightTable::resolve(&api, &program, 1);
    assert_eq!(table.len(), 1);

    let light = PointLight {
        position: Vector4::new(0.0, 20.0, 0.0, 1.0),
        ..Default::default()
    };
    let view = Matrix4::look_at_rh(
        Point3::new(4.0, 4.0, 4.0),
        Point3::new(0.0, 0.0, 0.0),
        Vector3::unit_y(),
    );
    table.upload(&mut api, &[light], &view);

    let pos = desc.uniforms.location("light.pos").unwrap();
    let color = desc.uniforms.location("light.color").unwrap();
    assert_eq!(api.vec4_uploads(pos), vec![view * light.position]);
    assert_eq!(api.vec4_uploads(color), vec![Vector4::new(1.0, 1.0, 1.0, 1.0)]);
}
