extern crate insta;
extern crate musubi;
#[macro_use]
extern crate pretty_assertions;

use std::collections::BTreeMap;

use insta::assert_snapshot;
use musubi::errors::ErrorKind;
use musubi::prelude::*;

/// A vertex stage with an empty `main` and one root per object
fn vertex(objects: &[ObjectId]) -> BTreeMap<Stage, StageInput> {
    let mut input = StageInput::new("");
    for (index, &object) in objects.iter().enumerate() {
        input.push(Root::new(&format!("hook{}", index), object));
    }

    let mut stages = BTreeMap::new();
    stages.insert(Stage::Vertex, input);
    stages
}

#[test]
fn test_compile_idempotent() {
    let mut shaders = Shaders::default();
    let transform = shaders
        .function("vec4 $transform(vec4 pos) { return $matrix * pos; }")
        .unwrap();
    let matrix = shaders.assign(transform, "matrix", Value::Mat4([0.0; 16])).unwrap();

    let mut stages = BTreeMap::new();
    stages.insert(
        Stage::Vertex,
        StageInput::new("void main() { gl_Position = $transform(vec4(0.0)); }")
            .root(Root::new("transform", transform)),
    );

    let mut compiler = Compiler::new();
    let first = compiler.compile(&shaders, &stages).unwrap();
    assert_eq!(
        &first[Stage::Vertex],
        "uniform mat4 u_matrix;\n\
         vec4 transform(vec4 pos) { return u_matrix * pos; }\n\
         void main() { gl_Position = transform(vec4(0.0)); }"
    );
    assert_eq!(compiler.recompiled(), &[matrix, transform]);
    assert_eq!(first.objects, vec![matrix, transform]);

    let second = compiler.compile(&shaders, &stages).unwrap();
    assert_eq!(first.sources, second.sources);
    assert!(compiler.recompiled().is_empty());
    assert_eq!(compiler.name(transform), Some("transform"));
    assert_eq!(compiler.name(matrix), Some("u_matrix"));
}

#[test]
fn test_deterministic_collision_recovery() {
    let build = || {
        let mut shaders = Shaders::default();
        let a = shaders.function("float $foo(float x) { return x; }").unwrap();
        let b = shaders.function("float $foo(float x) { return -x; }").unwrap();
        (shaders, a, b)
    };

    let mut assignments = Vec::new();
    for _ in 0..2 {
        let (shaders, a, b) = build();
        let mut compiler = Compiler::new();

        compiler.compile(&shaders, &vertex(&[a])).unwrap();
        compiler.compile(&shaders, &vertex(&[b])).unwrap();
        assert_eq!(compiler.name(a), Some("foo"));
        assert_eq!(compiler.name(b), Some("foo"));

        let compiled = compiler.compile(&shaders, &vertex(&[a, b])).unwrap();
        assert_eq!(
            &compiled[Stage::Vertex],
            "float foo(float x) { return x; }\nfloat foo_1(float x) { return -x; }"
        );

        // the recovered names stick, whatever the root order
        compiler.compile(&shaders, &vertex(&[b, a])).unwrap();
        assignments.push((
            compiler.name(a).map(String::from),
            compiler.name(b).map(String::from),
        ));
    }

    assert_eq!(
        assignments[0],
        (Some(String::from("foo")), Some(String::from("foo_1")))
    );
    assert_eq!(assignments[0], assignments[1]);
}

#[test]
fn test_rename_invalidates_referrers() {
    let mut shaders = Shaders::default();
    let a = shaders.function("float $foo(float x) { return x; }").unwrap();
    let b = shaders.function("float $foo(float x) { return -x; }").unwrap();
    let user = shaders
        .function("float $bar(float x) { return $inner(x); }")
        .unwrap();
    shaders.bind(user, "inner", b).unwrap();

    let mut compiler = Compiler::new();
    compiler.compile(&shaders, &vertex(&[user])).unwrap();
    assert_eq!(
        compiler.cached_code(user),
        Some("float bar(float x) { return foo(x); }")
    );

    compiler.compile(&shaders, &vertex(&[a])).unwrap();
    let compiled = compiler.compile(&shaders, &vertex(&[a, user])).unwrap();
    assert_eq!(compiler.name(b), Some("foo_1"));
    assert_eq!(
        &compiled[Stage::Vertex],
        "float foo(float x) { return x; }\n\
         float foo_1(float x) { return -x; }\n\
         float bar(float x) { return foo_1(x); }"
    );
}

#[test]
fn test_dependency_order_and_dedup() {
    let mut shaders = Shaders::default();
    let c = shaders.function("float $c(float x) { return x + 1.0; }").unwrap();
    let b = shaders.function("float $b(float x) { return $c(x) * 2.0; }").unwrap();
    let a = shaders.function("float $a(float x) { return $b(x) - 1.0; }").unwrap();
    let d = shaders.function("float $d(float x) { return $c(x); }").unwrap();
    shaders.bind(b, "c", c).unwrap();
    shaders.bind(a, "b", b).unwrap();
    shaders.bind(d, "c", c).unwrap();

    let compiled = compiler_output(&shaders, &vertex(&[a, d]));
    assert_eq!(compiled.objects, vec![c, b, a, d]);

    let source = &compiled[Stage::Vertex];
    assert_eq!(source.matches("float c(").count(), 1);

    let position = |code: &str| source.find(code).unwrap();
    assert!(position("float c(") < position("float b("));
    assert!(position("float b(") < position("float a("));
    assert!(position("float a(") < position("float d("));
}

fn compiler_output(shaders: &Shaders, stages: &BTreeMap<Stage, StageInput>) -> Compiled {
    Compiler::new().compile(shaders, stages).unwrap()
}

#[test]
fn test_unbound_template_variable() {
    let mut shaders = Shaders::default();
    let shade = shaders
        .function("vec4 $shade(vec4 color) { return color * $light; }")
        .unwrap();

    let mut compiler = Compiler::new();
    match *compiler.compile(&shaders, &vertex(&[shade])).unwrap_err().kind() {
        ErrorKind::UnboundTemplateVariable(ref function, ref var) => {
            assert_eq!(function, "shade");
            assert_eq!(var, "light");
        }
        ref kind => panic!("unexpected error {:?}", kind),
    }

    assert_eq!(compiler.name(shade), None);
    assert!(compiler.recompiled().is_empty());
}

#[test]
fn test_unbound_main_hook() {
    let shaders = Shaders::default();
    let mut stages = BTreeMap::new();
    stages.insert(Stage::Fragment, StageInput::new("void main() { $missing(); }"));

    match *compile_program(&shaders, &stages).unwrap_err().kind() {
        ErrorKind::UnboundTemplateVariable(ref function, ref var) => {
            assert_eq!(function, "main");
            assert_eq!(var, "missing");
        }
        ref kind => panic!("unexpected error {:?}", kind),
    }
}

#[test]
fn test_cache_stable_under_value_change() {
    let mut shaders = Shaders::default();
    let tint = shaders
        .function("vec4 $tint(vec4 color) { return color * $scale; }")
        .unwrap();
    let scale = shaders.assign(tint, "scale", 1.0f32).unwrap();
    let stages = vertex(&[tint]);

    let mut compiler = Compiler::new();
    let first = compiler.compile(&shaders, &stages).unwrap();
    let cached = compiler.cached_code(tint).map(String::from);

    let generation = shaders.generation();
    shaders.set_value(scale, 3.0f32).unwrap();
    assert!(shaders.generation() > generation);

    let second = compiler.compile(&shaders, &stages).unwrap();
    assert!(compiler.recompiled().is_empty());
    assert_eq!(compiler.cached_code(tint).map(String::from), cached);
    assert_eq!(first.sources, second.sources);
}

#[test]
fn test_fixed_name_collision() {
    let mut shaders = Shaders::default();
    let first = shaders.declare("uniform float scale").unwrap();
    let second = shaders.declare("uniform vec2 scale").unwrap();
    let func = shaders
        .function("float $f(float x) { return x * $a + $b.x; }")
        .unwrap();
    shaders.bind(func, "a", first).unwrap();
    shaders.bind(func, "b", second).unwrap();

    let mut compiler = Compiler::new();
    match *compiler.compile(&shaders, &vertex(&[func])).unwrap_err().kind() {
        ErrorKind::NameCollision(ref name, one, other) => {
            assert_eq!(name, "scale");
            assert_eq!(one, first);
            assert_eq!(other, second);
        }
        ref kind => panic!("unexpected error {:?}", kind),
    }

    assert_eq!(compiler.name(func), None);
    assert_eq!(compiler.cached_code(func), None);
}

#[test]
fn test_reserved_names() {
    let mut shaders = Shaders::default();
    let fixed = shaders.function("float sample(float x) { return x; }").unwrap();
    match *compile_program(&shaders, &vertex(&[fixed])).unwrap_err().kind() {
        ErrorKind::ReservedName(ref name) => assert_eq!(name, "sample"),
        ref kind => panic!("unexpected error {:?}", kind),
    }

    let mut lenient = Compiler::with_settings(Settings {
        reserve_keywords: false,
        ..Settings::default()
    });
    lenient.compile(&shaders, &vertex(&[fixed])).unwrap();
    assert_eq!(lenient.name(fixed), Some("sample"));

    let anonymous = shaders.function("float $int(float x) { return x; }").unwrap();
    let mut compiler = Compiler::new();
    compiler.compile(&shaders, &vertex(&[anonymous])).unwrap();
    assert_eq!(compiler.name(anonymous), Some("int_1"));
}

#[test]
fn test_static_names_are_reserved() {
    let mut shaders = Shaders::default();
    let func = shaders
        .function("float $f(float x) { return x * $x; }")
        .unwrap();
    let x = shaders.uniform("x", 2.0f32);
    shaders.bind(func, "x", x).unwrap();

    assert_eq!(
        compile_object(&shaders, func).unwrap(),
        "uniform float x_1;\nfloat f(float x) { return x * x_1; }"
    );
}

#[test]
fn test_required_names() {
    let mut shaders = Shaders::default();
    let anonymous = shaders
        .function("vec4 $transform(vec4 pos) { return pos; }")
        .unwrap();
    let fixed = shaders
        .function("vec4 position(vec4 pos) { return pos; }")
        .unwrap();

    let mut stages = BTreeMap::new();
    stages.insert(
        Stage::Vertex,
        StageInput::new("").root(Root::named("hook", anonymous, "map_position")),
    );
    let mut compiler = Compiler::new();
    compiler.compile(&shaders, &stages).unwrap();
    assert_eq!(compiler.name(anonymous), Some("map_position"));

    stages.insert(
        Stage::Vertex,
        StageInput::new("").root(Root::named("hook", fixed, "map_position")),
    );
    match *compiler.compile(&shaders, &stages).unwrap_err().kind() {
        ErrorKind::RequiredNameMismatch(ref declared, ref required) => {
            assert_eq!(declared, "position");
            assert_eq!(required, "map_position");
        }
        ref kind => panic!("unexpected error {:?}", kind),
    }
}

#[test]
fn test_cycles_are_rejected() {
    let mut shaders = Shaders::default();
    let a = shaders.function("float $a(float x) { return $next(x); }").unwrap();
    let b = shaders.function("float $b(float x) { return $next(x); }").unwrap();
    shaders.bind(a, "next", b).unwrap();

    match *shaders.bind(b, "next", a).unwrap_err().kind() {
        ErrorKind::CyclicDependency(id) => assert_eq!(id, b),
        ref kind => panic!("unexpected error {:?}", kind),
    }

    match *shaders.bind(a, "next", a).unwrap_err().kind() {
        ErrorKind::CyclicDependency(id) => assert_eq!(id, a),
        ref kind => panic!("unexpected error {:?}", kind),
    }
}

#[test]
fn test_fast_naming() {
    let mut shaders = Shaders::default();
    let transform = shaders
        .function("vec4 $transform(vec4 pos) { return pos; }")
        .unwrap();

    let mut compiler = Compiler::with_settings(Settings {
        naming: Naming::Fast,
        ..Settings::default()
    });
    compiler.compile(&shaders, &vertex(&[transform])).unwrap();

    let expected = format!("transform_{:x}", transform.index());
    assert_eq!(compiler.name(transform), Some(expected.as_str()));
}

#[test]
fn test_forget() {
    let mut shaders = Shaders::default();
    let tint = shaders
        .function("vec4 $tint(vec4 color) { return color * $scale; }")
        .unwrap();
    let scale = shaders.assign(tint, "scale", 1.0f32).unwrap();

    let mut compiler = Compiler::new();
    compiler.compile(&shaders, &vertex(&[tint])).unwrap();
    assert!(compiler.cached_code(tint).is_some());

    compiler.forget(&shaders, scale);
    assert_eq!(compiler.name(scale), None);
    assert_eq!(compiler.cached_code(scale), None);
    assert_eq!(compiler.cached_code(tint), None);
    assert_eq!(compiler.name(tint), Some("tint"));
}

#[test]
fn test_program_stages() {
    let mut shaders = Shaders::default();
    let transform = shaders
        .function("vec4 $transform(vec4 pos) { return $scale * pos; }")
        .unwrap();
    shaders.assign(transform, "scale", 2.0f32).unwrap();
    let position = shaders.attribute("a_position", BufferRef::new(1, "vec4"));
    let color = shaders.varying("v_color", Some("vec4"));

    let mut stages = BTreeMap::new();
    stages.insert(
        Stage::Vertex,
        StageInput::new(
            "
            void main() {
                $color = vec4(1.0);
                gl_Position = $transform($position);
            }
            ",
        )
        .root(Root::new("transform", transform))
        .root(Root::new("position", position))
        .root(Root::new("color", color)),
    );
    stages.insert(
        Stage::Fragment,
        StageInput::new(
            "
            void main() {
                gl_FragColor = $color;
            }
            ",
        )
        .root(Root::new("color", color)),
    );

    let mut compiler = Compiler::with_settings(Settings {
        version: Some(String::from("120")),
        ..Settings::default()
    });
    let compiled = compiler.compile(&shaders, &stages).unwrap();

    assert_snapshot!(&compiled[Stage::Vertex], @r###"
    #version 120
    uniform float u_scale;
    vec4 transform(vec4 pos) { return u_scale * pos; }
    attribute vec4 a_position;
    varying vec4 v_color;
    void main() {
        v_color = vec4(1.0);
        gl_Position = transform(a_position);
    }
    "###);

    assert_snapshot!(&compiled[Stage::Fragment], @r###"
    #version 120
    varying vec4 v_color;
    void main() {
        gl_FragColor = v_color;
    }
    "###);

    // shared objects are compiled once and emitted in both stages
    assert_eq!(compiler.recompiled().len(), 4);
    assert_eq!(compiled.objects.len(), 4);
}

#[test]
fn test_main_names_reserved() {
    let mut shaders = Shaders::default();
    let transform = shaders
        .function("vec4 $helper(vec4 pos) { return pos * $scale; }")
        .unwrap();
    let scale = shaders.assign(transform, "scale", 2.0f32).unwrap();

    let main = "uniform float u_scale;\n\
                float helper(float x) { return x * u_scale; }\n\
                void main() {\n    gl_Position = $transform(vec4(helper(1.0)));\n}";
    let input = StageInput::new(main).root(Root::new("transform", transform));
    assert_eq!(input.static_names(), &["u_scale", "helper", "x"]);

    let mut stages = BTreeMap::new();
    stages.insert(Stage::Vertex, input);

    let mut compiler = Compiler::new();
    let compiled = compiler.compile(&shaders, &stages).unwrap();
    assert_eq!(compiler.name(scale), Some("u_scale_1"));
    assert_eq!(compiler.name(transform), Some("helper_1"));

    let vertex = &compiled[Stage::Vertex];
    assert_eq!(vertex.matches("uniform float u_scale;").count(), 1);
    assert_eq!(vertex.matches("float helper(").count(), 1);
    assert_eq!(
        vertex,
        "uniform float u_scale_1;\n\
         vec4 helper_1(vec4 pos) { return pos * u_scale_1; }\n\
         uniform float u_scale;\n\
         float helper(float x) { return x * u_scale; }\n\
         void main() {\n    gl_Position = helper_1(vec4(helper(1.0)));\n}"
    );
}

#[test]
fn test_main_prototypes_reserved() {
    let mut shaders = Shaders::default();
    let shade = shaders.function("vec4 $shade() { return vec4(1.0); }").unwrap();

    let input = StageInput::new("vec4 shade(void);\nvoid main() {}").root(Root::new("hook", shade));
    assert_eq!(input.static_names(), &["shade"]);

    let mut stages = BTreeMap::new();
    stages.insert(Stage::Fragment, input);

    let mut compiler = Compiler::new();
    compiler.compile(&shaders, &stages).unwrap();
    assert_eq!(compiler.name(shade), Some("shade_1"));
}

#[test]
fn test_fixed_name_displaces_cached() {
    let mut shaders = Shaders::default();
    let anonymous = shaders.function("float $foo(float x) { return x; }").unwrap();
    let user = shaders
        .function("float $bar(float x) { return $inner(x); }")
        .unwrap();
    shaders.bind(user, "inner", anonymous).unwrap();

    let mut compiler = Compiler::new();
    compiler.compile(&shaders, &vertex(&[user])).unwrap();
    assert_eq!(compiler.name(anonymous), Some("foo"));

    let fixed = shaders.function("float foo(float x) { return 2.0 * x; }").unwrap();
    let compiled = compiler.compile(&shaders, &vertex(&[fixed, user])).unwrap();

    assert_eq!(compiler.name(fixed), Some("foo"));
    assert_eq!(compiler.name(anonymous), Some("foo_1"));
    assert_eq!(
        &compiled[Stage::Vertex],
        "float foo(float x) { return 2.0 * x; }\n\
         float foo_1(float x) { return x; }\n\
         float bar(float x) { return foo_1(x); }"
    );
    assert!(compiler.recompiled().contains(&anonymous));
    assert!(compiler.recompiled().contains(&user));
}

#[test]
fn test_call_expressions() {
    let mut shaders = Shaders::default();
    let transform = shaders
        .function("vec4 $transform(vec4 pos) { return pos * $scale; }")
        .unwrap();
    shaders.assign(transform, "scale", 2.0f32).unwrap();
    let position = shaders.attribute("a_position", BufferRef::new(1, "vec4"));
    let call = shaders.call(transform, &[position]).unwrap();

    assert_eq!(shaders.dependencies(call).unwrap(), vec![transform, position]);
    assert_eq!(shaders.referrers(transform), vec![call]);
    assert_eq!(shaders.dtype(call), Some("vec4"));

    let mut stages = BTreeMap::new();
    stages.insert(
        Stage::Vertex,
        StageInput::new("void main() { gl_Position = $position; }").root(Root::new("position", call)),
    );

    let mut compiler = Compiler::new();
    let compiled = compiler.compile(&shaders, &stages).unwrap();
    assert_eq!(
        &compiled[Stage::Vertex],
        "uniform float u_scale;\n\
         vec4 transform(vec4 pos) { return pos * u_scale; }\n\
         attribute vec4 a_position;\n\
         void main() { gl_Position = transform(a_position); }"
    );
    assert_eq!(compiler.name(call), None);
    assert!(!compiled.objects.contains(&call));

    match *shaders.call(transform, &[]).unwrap_err().kind() {
        ErrorKind::CallArity(ref function, expected, found) => {
            assert_eq!(function, "transform");
            assert_eq!((expected, found), (1, 0));
        }
        ref kind => panic!("unexpected error {:?}", kind),
    }
}

#[test]
fn test_call_arguments_rename() {
    let mut shaders = Shaders::default();
    let transform = shaders
        .function("vec4 $transform(vec4 pos) { return pos; }")
        .unwrap();
    let position = shaders.attribute("a_position", BufferRef::new(1, "vec4"));
    let call = shaders.call(transform, &[position]).unwrap();
    let outer = shaders.function("vec4 $outer() { return $value; }").unwrap();
    shaders.bind(outer, "value", call).unwrap();

    let mut compiler = Compiler::new();
    compiler.compile(&shaders, &vertex(&[outer])).unwrap();
    assert_eq!(
        compiler.cached_code(outer),
        Some("vec4 outer() { return transform(a_position); }")
    );

    let fixed = shaders.function("vec4 transform(vec4 pos) { return -pos; }").unwrap();
    compiler.compile(&shaders, &vertex(&[fixed, outer])).unwrap();
    assert_eq!(compiler.name(transform), Some("transform_1"));
    assert_eq!(
        compiler.cached_code(outer),
        Some("vec4 outer() { return transform_1(a_position); }")
    );
}

#[test]
fn test_post_hooks() {
    let mut shaders = Shaders::default();
    let transform = shaders
        .function("vec4 $transform(vec4 pos) { return pos; }")
        .unwrap();
    let position = shaders.attribute("a_position", BufferRef::new(1, "vec4"));
    let call = shaders.call(transform, &[position]).unwrap();
    let tint = shaders.uniform("u_tint", [1.0f32, 0.0, 0.0, 1.0]);
    let color = shaders.varying("v_color", None);

    let mut input = StageInput::new("void main() {\n}");
    input.assign("gl_Position", position).unwrap();
    input.assign("gl_Position", call).unwrap();
    input.assign_varying(&mut shaders, color, tint).unwrap();
    assert_eq!(
        input.post_hooks(),
        &[
            (Target::Builtin(String::from("gl_Position")), call),
            (Target::Varying(color), tint),
        ]
    );
    assert_eq!(shaders.dtype(color), Some("vec4"));

    let mut stages = BTreeMap::new();
    stages.insert(Stage::Vertex, input);
    stages.insert(
        Stage::Fragment,
        StageInput::new("void main() {\n    gl_FragColor = $color;\n}").root(Root::new("color", color)),
    );

    let compiled = compile_program(&shaders, &stages).unwrap();
    assert_snapshot!(&compiled[Stage::Vertex], @r###"
    vec4 transform(vec4 pos) { return pos; }
    attribute vec4 a_position;
    varying vec4 v_color;
    uniform vec4 u_tint;
    void main() {
        gl_Position = transform(a_position);
        v_color = u_tint;
    }
    "###);
    assert_eq!(
        &compiled[Stage::Fragment],
        "varying vec4 v_color;\nvoid main() {\n    gl_FragColor = v_color;\n}"
    );
}

#[test]
fn test_invalid_post_hooks() {
    let mut shaders = Shaders::default();
    let tint = shaders.uniform("u_tint", [1.0f32; 4]);
    let mut input = StageInput::new("void main() {}");

    match *input.assign("v_color", tint).unwrap_err().kind() {
        ErrorKind::InvalidPostHook(ref target) => assert_eq!(target, "v_color"),
        ref kind => panic!("unexpected error {:?}", kind),
    }

    let other = shaders.uniform("u_other", [0.0f32; 4]);
    match *input.assign_varying(&mut shaders, other, tint).unwrap_err().kind() {
        ErrorKind::InvalidPostHook(ref target) => assert_eq!(target, "u_other"),
        ref kind => panic!("unexpected error {:?}", kind),
    }

    assert!(input.post_hooks().is_empty());
    input.assign("gl_FragData[0]", tint).unwrap();
    assert_eq!(input.post_hooks().len(), 1);
}

#[test]
fn test_shared_object_generated_once() {
    let mut shaders = Shaders::default();
    let color = shaders.varying("v_color", Some("vec4"));

    let mut stages = BTreeMap::new();
    stages.insert(
        Stage::Vertex,
        StageInput::new("void main() { $color = vec4(1.0); }").root(Root::new("color", color)),
    );
    stages.insert(
        Stage::Fragment,
        StageInput::new("void main() { gl_FragColor = $color; }").root(Root::new("color", color)),
    );

    let mut compiler = Compiler::new();
    let compiled = compiler.compile(&shaders, &stages).unwrap();
    assert!(compiled[Stage::Vertex].starts_with("varying vec4 v_color;"));
    assert!(compiled[Stage::Fragment].starts_with("varying vec4 v_color;"));
    assert_eq!(compiler.recompiled(), &[color]);
}
