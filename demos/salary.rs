use dectree::{Condition, Node, Outcome, Params, Tree};

fn main() {
    let coffee = Condition::new("free_coffee == true")
        .expect("invalid condition")
        .with_branch(true, Node::from(Outcome::new("accept").expect("invalid outcome")))
        .with_branch(false, Node::from(Outcome::new("decline").expect("invalid outcome")));
    let commute = Condition::new("commutation_hour >= 2")
        .expect("invalid condition")
        .with_branch(true, Node::from(Outcome::new("decline").expect("invalid outcome")))
        .with_branch(false, Node::from(coffee));
    let tree = Tree::new(
        Condition::new("salary >= 50000")
            .expect("invalid condition")
            .with_branch(true, Node::from(commute))
            .with_branch(false, Node::from(Outcome::new("decline").expect("invalid outcome"))),
    );

    println!("{tree}");

    let offers = [
        Params::new()
            .set("salary", 50000_i64)
            .set("commutation_hour", 1_i64)
            .set("free_coffee", true),
        Params::new().set("salary", 49999_i64),
        Params::new()
            .set("salary", 50000_i64)
            .set("commutation_hour", 1_i64),
    ];

    for params in &offers {
        match tree.decide_detailed(params) {
            Ok(report) => println!("{report}"),
            Err(e) => println!("error: {e}"),
        }
    }
}
