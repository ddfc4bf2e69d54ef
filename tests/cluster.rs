mod common;

use common::parse_csv_rows;
use table_probe::{ClusterHeaders, TypeIntuiter};

fn header_labels(raw: &str) -> Vec<String> {
    let rows = parse_csv_rows(raw).expect("parse fixture");
    let intuiter = TypeIntuiter::new().run(rows, None);
    intuiter
        .schema()
        .into_iter()
        .map(|(name, _)| name)
        .collect()
}

#[test]
fn drifting_deliveries_cluster_into_one_destination() {
    let january = "order_id,region,total,units\n1,East,10.5,3\n2,West,8.0,2\n";
    let february = "order_id,region,total,units,notes\n3,East,12.0,4,rush\n4,North,6.5,1,\n";
    let unrelated = "sku,warehouse,on_hand\nA1,PDX,40\nB2,SEA,12\n";

    let mut cluster = ClusterHeaders::new();
    cluster.add_header("orders_january", header_labels(january));
    cluster.add_header("orders_february", header_labels(february));
    cluster.add_header("stock", header_labels(unrelated));

    let groups = cluster.cluster();
    assert_eq!(groups.len(), 1);
    let (destination, members) = groups.iter().next().unwrap();
    assert_eq!(destination, "orders");
    assert_eq!(
        members,
        &vec!["orders_february".to_string(), "orders_january".to_string()]
    );
}
