//! Serialized record shapes: minimal-diff group encoding, connection
//! records, layout-file parsing and the two-pass import.

use std::f64::consts::PI;

use pretty_assertions::assert_eq;

use trackplan::{
    Board, BoundingBox, ConnectionRecord, Container, ContainerId, GroupId, GroupRecord,
    ImportContext, LayoutFile, PieceId, Point, PolarVector, Pose,
};

fn board_with_layer() -> (Board, ContainerId) {
    let mut board = Board::new();
    let layer = board.add_container(Container::new(
        ContainerId::new("layer"),
        Point::new(0.0, 0.0),
    ));
    (board, layer)
}

fn straight_piece(board: &mut Board, layer: &ContainerId, x: f64, y: f64) -> PieceId {
    let pid = board
        .place_piece(
            0,
            layer,
            Pose::new(x, y, 0.0),
            BoundingBox::new(-10.0, -5.0, 20.0, 10.0),
        )
        .unwrap();
    board
        .add_connection(&pid, PolarVector::new(10.0, PI, PI), 0, 0, 1)
        .unwrap();
    board
        .add_connection(&pid, PolarVector::new(10.0, 0.0, 0.0), 0, 1, 0)
        .unwrap();
    pid
}

#[test]
fn plain_group_serializes_to_just_its_id() {
    let mut board = Board::new();
    let gid = board.import_group_record(&GroupRecord {
        id: "g1".into(),
        group: None,
        locked: None,
    });
    assert_eq!(gid, Some(GroupId::new("g1")));

    let record = board.serialize_group(&GroupId::new("g1")).unwrap();
    assert_eq!(record.group, None);
    assert_eq!(record.locked, None);
    insta::assert_snapshot!(toml::to_string(&record).unwrap(), @r###"
    id = "g1"
    "###);
}

#[test]
fn nested_locked_group_serializes_all_three_fields() {
    let mut board = Board::new();
    board
        .import_group_record(&GroupRecord {
            id: "parent".into(),
            group: None,
            locked: None,
        })
        .unwrap();
    let records = vec![
        GroupRecord {
            id: "parent".into(),
            group: None,
            locked: None,
        },
        GroupRecord {
            id: "child".into(),
            group: Some("parent".into()),
            locked: Some(1),
        },
    ];
    board.import_group_record(&records[1]).unwrap();
    board.resolve_group_nesting(&records);

    let record = board.serialize_group(&GroupId::new("child")).unwrap();
    assert_eq!(
        record,
        GroupRecord {
            id: "child".into(),
            group: Some("parent".into()),
            locked: Some(1),
        }
    );
    insta::assert_snapshot!(toml::to_string(&record).unwrap(), @r###"
    id = "child"
    group = "parent"
    locked = 1
    "###);
}

#[test]
fn group_record_round_trips_identically() {
    let record = GroupRecord {
        id: "child".into(),
        group: Some("parent".into()),
        locked: Some(1),
    };
    let encoded = toml::to_string(&record).unwrap();
    let decoded: GroupRecord = toml::from_str(&encoded).unwrap();
    assert_eq!(decoded, record);
    assert_eq!(toml::to_string(&decoded).unwrap(), encoded);
}

#[test]
fn malformed_records_are_rejected_by_validation() {
    assert!(!GroupRecord {
        id: "has space".into(),
        group: None,
        locked: None,
    }
    .is_valid());
    assert!(!ConnectionRecord::new("", "x").is_valid());
    assert!(ConnectionRecord::new("c-1", "").is_valid());

    let mut board = Board::new();
    assert_eq!(
        board.import_group_record(&GroupRecord {
            id: "bad id".into(),
            group: None,
            locked: None,
        }),
        None
    );
}

#[test]
fn layout_file_parses_and_defaults() {
    let layout = LayoutFile::from_toml(
        r#"
        [[connections]]
        id = "c1"
        other_connection = "c2"

        [[connections]]
        id = "c2"
        other_connection = "c1"

        [[groups]]
        id = "g1"
        "#,
    )
    .unwrap();
    assert_eq!(layout.connections.len(), 2);
    assert_eq!(layout.groups.len(), 1);
    assert_eq!(layout.groups[0].group, None);

    let empty = LayoutFile::from_toml("").unwrap();
    assert_eq!(empty, LayoutFile::default());
}

#[test]
fn two_pass_import_restores_pairings() {
    let (mut board, layer) = board_with_layer();
    let a = straight_piece(&mut board, &layer, 0.0, 0.0);
    let b = straight_piece(&mut board, &layer, 20.0, 0.0);
    let a_conns = board.piece(&a).unwrap().connections.clone();
    let b_conns = board.piece(&b).unwrap().connections.clone();

    let records = vec![
        ConnectionRecord::new("c1", ""),
        ConnectionRecord::new("c2", "c3"),
        ConnectionRecord::new("c3", "c2"),
        ConnectionRecord::new("c4", ""),
    ];
    let mut ctx = ImportContext::new();
    for (live, record) in [&a_conns[0], &a_conns[1], &b_conns[0], &b_conns[1]]
        .into_iter()
        .zip(&records)
    {
        assert!(board.adopt_connection_record(live, record, &mut ctx));
    }
    board.resolve_pairings(&records, &ctx);

    // a's east (now c2) is paired with b's west (now c3); the rest stay open.
    let c2 = ctx.resolve("c2").unwrap().clone();
    let c3 = ctx.resolve("c3").unwrap().clone();
    assert_eq!(board.connection(&c2).unwrap().paired_with, Some(c3.clone()));
    assert_eq!(board.connection(&c3).unwrap().paired_with, Some(c2));
    let open = &board.container(&layer).unwrap().open_connections;
    assert_eq!(open.len(), 2);
    assert!(open.contains(ctx.resolve("c1").unwrap()));
    assert!(open.contains(ctx.resolve("c4").unwrap()));

    // Reserializing yields the imported records.
    let reserialized: Vec<ConnectionRecord> = ["c1", "c2", "c3", "c4"]
        .iter()
        .map(|id| {
            board
                .serialize_connection(ctx.resolve(id).unwrap())
                .unwrap()
        })
        .collect();
    assert_eq!(reserialized, records);
}
