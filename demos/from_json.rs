use dectree::{Params, Tree};

fn main() {
    let tree = Tree::from_file("demos/salary.json").expect("failed to load tree");

    println!("{tree}");

    let params: Params = serde_json::from_str(
        r#"{"salary": 62000, "commutation_hour": 1, "free_coffee": false}"#,
    )
    .expect("invalid params");

    match tree.decide(&params) {
        Ok(outcome) => println!("Result: {outcome}"),
        Err(e) => println!("Undecided: {e}"),
    }

    println!();
    println!("{}", tree.to_json_pretty().expect("failed to encode tree"));
}
