mod common;

use std::ptr;

use common::{Arg, TestArgv, file, nested, plain};
use serial_test::serial;
use svlib_dpi::{ArgFlattener, FlattenError, Limits, argument_flatten_next};

fn flatten(argv: &TestArgv, limits: Limits) -> Result<Vec<String>, FlattenError> {
    let flattener = unsafe { ArgFlattener::new(argv.root(), limits) };
    flattener
        .map(|arg| arg.map(|s| s.to_str().unwrap().to_owned()))
        .collect()
}

fn flatten_default(args: Vec<Arg>) -> Vec<String> {
    flatten(&TestArgv::new(args), Limits::DEFAULT).unwrap()
}

#[test]
fn plain_arguments_pass_through() {
    assert_eq!(
        flatten_default(vec![plain("sim"), plain("+verbose"), plain("top")]),
        vec!["sim", "+verbose", "top"]
    );
}

#[test]
fn nested_file_is_spliced_in_place() {
    let args = vec![
        plain("A"),
        file("args.f", vec![plain("P"), plain("Q")]),
        plain("B"),
    ];
    assert_eq!(flatten_default(args), vec!["A", "P", "Q", "B"]);
}

#[test]
fn upper_case_flag_is_also_an_indirection() {
    let args = vec![
        Arg::File {
            flag: "-F",
            label: "rel.f",
            args: vec![plain("X")],
        },
        plain("Y"),
    ];
    assert_eq!(flatten_default(args), vec!["X", "Y"]);
}

#[test]
fn deep_nesting_keeps_depth_first_order() {
    let args = vec![
        plain("1"),
        file(
            "outer.f",
            vec![
                plain("2"),
                file("inner.f", vec![plain("3"), file("leaf.f", vec![plain("4")])]),
                plain("5"),
            ],
        ),
        file("second.f", vec![plain("6")]),
        plain("7"),
    ];
    assert_eq!(flatten_default(args), vec!["1", "2", "3", "4", "5", "6", "7"]);
}

#[test]
fn labels_are_never_returned() {
    let out = flatten_default(vec![file("secret.f", vec![plain("visible")])]);
    assert!(!out.iter().any(|a| a == "secret.f"));
    assert!(!out.iter().any(|a| a == "-f"));
}

#[test]
fn empty_nested_vector_yields_nothing() {
    let args = vec![plain("A"), Arg::EmptyFile("-f"), plain("B")];
    assert_eq!(flatten_default(args), vec!["A", "B"]);
}

#[test]
fn dangling_flag_ends_its_level() {
    let args = vec![
        file("x.f", vec![plain("P"), Arg::Dangling("-f")]),
        plain("after"),
    ];
    assert_eq!(flatten_default(args), vec!["P", "after"]);
}

#[test]
fn null_root_is_immediately_exhausted() {
    let mut flattener = unsafe { ArgFlattener::new(ptr::null(), Limits::DEFAULT) };
    assert_eq!(flattener.depth(), 0);
    assert_eq!(flattener.next_arg(), Ok(None));
    assert!(flattener.next().is_none());
}

#[test]
fn nesting_at_the_limit_is_accepted() {
    let limits = Limits {
        argv_stack_depth: 4,
        ..Limits::DEFAULT
    };
    // ルート + 3 段 = 4
    let argv = TestArgv::new(nested(3, "leaf"));
    assert_eq!(flatten(&argv, limits), Ok(vec!["leaf".to_owned()]));
}

#[test]
fn nesting_past_the_limit_is_an_error() {
    let limits = Limits {
        argv_stack_depth: 4,
        ..Limits::DEFAULT
    };
    let argv = TestArgv::new(nested(4, "leaf"));
    let mut flattener = unsafe { ArgFlattener::new(argv.root(), limits) };
    let err = flattener.next_arg().unwrap_err();
    assert_eq!(err, FlattenError::NestingTooDeep { limit: 4 });
    assert_eq!(err.code(), libc::E2BIG);

    // エラーの後は終了状態
    assert_eq!(flattener.depth(), 0);
    assert_eq!(flattener.next_arg(), Ok(None));
}

#[test]
fn depth_tracks_the_current_level() {
    let argv = TestArgv::new(vec![file("a.f", vec![plain("in")]), plain("out")]);
    let mut flattener = unsafe { ArgFlattener::new(argv.root(), Limits::DEFAULT) };
    assert_eq!(flattener.depth(), 1);
    assert_eq!(flattener.next_arg().unwrap().unwrap().to_bytes(), b"in");
    assert_eq!(flattener.depth(), 2);
    assert_eq!(flattener.next_arg().unwrap().unwrap().to_bytes(), b"out");
    assert_eq!(flattener.depth(), 1);
}

fn drain_shared(argv: &TestArgv) -> (Vec<String>, Option<FlattenError>) {
    let mut vector = argv.root();
    let mut out = Vec::new();
    loop {
        match unsafe { argument_flatten_next(&mut vector) } {
            Ok(Some(arg)) => {
                assert!(!vector.is_null());
                out.push(arg.to_str().unwrap().to_owned());
            }
            Ok(None) => break (out, None),
            Err(e) => {
                assert!(vector.is_null());
                break (out, Some(e));
            }
        }
    }
}

#[test]
#[serial]
fn shared_traversal_nulls_vector_at_end() {
    let argv = TestArgv::new(vec![plain("a"), file("f", vec![plain("b")])]);
    let mut vector = argv.root();
    assert_eq!(
        unsafe { argument_flatten_next(&mut vector) }.unwrap().unwrap().to_bytes(),
        b"a"
    );
    assert_eq!(
        unsafe { argument_flatten_next(&mut vector) }.unwrap().unwrap().to_bytes(),
        b"b"
    );
    assert_eq!(unsafe { argument_flatten_next(&mut vector) }, Ok(None));
    assert!(vector.is_null());
}

#[test]
#[serial]
fn shared_traversal_restarts_with_a_new_root() {
    let first = TestArgv::new(vec![plain("one")]);
    let second = TestArgv::new(vec![plain("two"), plain("three")]);
    assert_eq!(drain_shared(&first), (vec!["one".to_owned()], None));
    assert_eq!(
        drain_shared(&second),
        (vec!["two".to_owned(), "three".to_owned()], None)
    );
}

#[test]
#[serial]
fn shared_traversal_recovers_from_overflow() {
    let mut args = vec![plain("before")];
    args.extend(nested(40, "lost"));
    let deep = TestArgv::new(args);
    let (out, err) = drain_shared(&deep);
    assert_eq!(out, vec!["before"]);
    assert_eq!(err, Some(FlattenError::NestingTooDeep { limit: 32 }));

    let shallow = TestArgv::new(vec![plain("fine")]);
    assert_eq!(drain_shared(&shallow), (vec!["fine".to_owned()], None));
}
