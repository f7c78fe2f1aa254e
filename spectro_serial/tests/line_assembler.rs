use rstest::rstest;
use spectro_serial::LineAssembler;
use spectro_serial::util::MAX_LINE_BYTES;

#[rstest]
#[case(b"a\nb\n".as_slice(), &["a", "b"])]
#[case(b"a\r\nb\r\n".as_slice(), &["a", "b"])]
#[case(b"\n\n".as_slice(), &["", ""])]
#[case(b"partial".as_slice(), &[])]
#[case(b"x\ry\n".as_slice(), &["x\ry"])]
fn splits_lines(#[case] input: &[u8], #[case] expected: &[&str]) {
    let mut la = LineAssembler::default();
    la.push(input);
    let mut got = Vec::new();
    while let Some(l) = la.pop_line() {
        got.push(l);
    }
    assert_eq!(got, expected);
}

#[test]
fn byte_at_a_time_matches_bulk() {
    let input = b"SORTED(405-855nm): 1,2,3\r\nnoise\n1.5,2.5\n";
    let mut bulk = LineAssembler::default();
    bulk.push(input);
    let mut trickle = LineAssembler::default();
    for b in input {
        trickle.push(std::slice::from_ref(b));
    }
    for _ in 0..3 {
        assert_eq!(bulk.pop_line(), trickle.pop_line());
    }
}

#[test]
fn overlong_line_is_dropped_whole() {
    let mut la = LineAssembler::new(8);
    la.push(b"0123456789abcdef\nok\n");
    assert_eq!(la.pop_line().as_deref(), Some("ok"));
    assert_eq!(la.pop_line(), None);
    assert_eq!(la.overflows(), 1);
}

#[test]
fn default_limit_bounds_memory() {
    let mut la = LineAssembler::default();
    la.push(&vec![b'7'; MAX_LINE_BYTES * 3]);
    assert!(la.pending() <= MAX_LINE_BYTES);
    la.push(b"\n1,2\n");
    assert_eq!(la.pop_line().as_deref(), Some("1,2"));
}

#[test]
fn clear_drops_partial_and_queued() {
    let mut la = LineAssembler::default();
    la.push(b"done\npart");
    la.clear();
    la.push(b"ial\n");
    assert_eq!(la.pop_line().as_deref(), Some("ial"));
}
