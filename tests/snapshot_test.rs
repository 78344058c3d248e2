use pretty_assertions::assert_eq;

#[test]
fn snapshot_td_two_nodes() {
    let input = "\
graph TD
    A[Start] --> B[End]
";
    let output = mermaid_ascii::render(input).unwrap();
    let expected = "\
+-------+
| Start |
+-------+
    |
    |
    v
 +-----+
 | End |
 +-----+";
    assert_eq!(output, expected);
}

#[test]
fn snapshot_lr_two_nodes() {
    let output = mermaid_ascii::render("graph LR\n    A --> B\n").unwrap();
    let expected = "\
+---+     +---+
| A |---->| B |
+---+     +---+";
    assert_eq!(output, expected);
}

#[test]
fn snapshot_td_fan_out() {
    let input = "\
graph TD
    A --> B
    A --> C
";
    let output = mermaid_ascii::render(input).unwrap();
    let expected = "\
    +---+
    | A |
    +---+
     / \\
    /   \\
   v     v
+---+   +---+
| B |   | C |
+---+   +---+";
    assert_eq!(output, expected);
}

#[test]
fn snapshot_lr_labelled_edge() {
    let input = "\
graph LR
    A[Client] -->|request| B[Server]
";
    let output = mermaid_ascii::render(input).unwrap();
    let expected = "\
+--------+ request +--------+
| Client |-------->| Server |
+--------+         +--------+";
    assert_eq!(output, expected);
}

#[test]
fn snapshot_subgraph() {
    let input = "\
graph TD
    subgraph api [API]
        A --> B
    end
";
    let output = mermaid_ascii::render(input).unwrap();
    let expected = "\
+- API -+
| +---+ |
| | A | |
| +---+ |
|   |   |
|   |   |
|   v   |
| +---+ |
| | B | |
| +---+ |
+-------+";
    assert_eq!(output, expected);
}

#[test]
fn snapshot_wide_labels() {
    let input = "\
graph LR
    A[开始] --> B[结束]
";
    let output = mermaid_ascii::render(input).unwrap();
    let expected = "\
+------+     +------+
| 开始 |---->| 结束 |
+------+     +------+";
    assert_eq!(output, expected);
}

#[test]
fn snapshot_nested_subgraphs_above_outside_node() {
    let input = "\
graph TD
    subgraph a
        subgraph b
            subgraph c
                subgraph d
                    X
                end
            end
        end
    end
    X --> Y
";
    let output = mermaid_ascii::render(input).unwrap();
    let expected = "\
+- a ---------------+
| +- b -----------+ |
| | +- c -------+ | |
| | | +- d ---+ | | |
| | | | +---+ | | | |
| | | | | X | | | | |
| | | | +---+ | | | |
| | | +---|---+ | | |
| | +-----|-----+ | |
| +-------|-------+ |
+---------|---------+
          |
          |
          v
        +---+
        | Y |
        +---+";
    assert_eq!(output, expected);
}
