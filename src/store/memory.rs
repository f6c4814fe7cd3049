use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use crate::error::{Error, Result};
use crate::store::GraphStore;
use crate::traversal::{Column, Order, OrderBy, Step, Traversal, P};

type ElementId = u64;

#[derive(Debug)]
struct Vertex {
    label: String,
    properties: BTreeMap<String, Value>,
}

#[derive(Debug)]
struct Edge {
    label: String,
    out_v: ElementId,
    in_v: ElementId,
    properties: BTreeMap<String, Value>,
}

#[derive(Debug, Default)]
struct Graph {
    next_id: ElementId,
    vertices: BTreeMap<ElementId, Vertex>,
    edges: BTreeMap<ElementId, Edge>,
}

/// Anything a traverser can sit on.
#[derive(Clone, Debug, PartialEq)]
enum Item {
    Vertex(ElementId),
    Edge(ElementId),
    Value(Value),
    Entry(Box<Item>, Box<Item>),
    Map(Vec<(Item, Item)>),
    Path(Vec<Item>),
}

#[derive(Clone, Debug)]
struct Traverser {
    item: Item,
    path: Vec<Item>,
    labels: Vec<(String, Item)>,
}

impl Traverser {
    fn root() -> Self {
        Self::detached(Item::Value(Value::Null))
    }

    fn detached(item: Item) -> Self {
        Self {
            item,
            path: Vec::new(),
            labels: Vec::new(),
        }
    }

    /// Move to another element, extending the path.
    fn walk(&self, item: Item) -> Self {
        let mut path = self.path.clone();
        path.push(item.clone());
        Self {
            item,
            path,
            labels: self.labels.clone(),
        }
    }

    /// Replace the current object without recording it in the path.
    fn split(&self, item: Item) -> Self {
        Self {
            item,
            path: self.path.clone(),
            labels: self.labels.clone(),
        }
    }
}

/// In-process property graph that evaluates [`Traversal`]s directly.
///
/// Only single-valued properties are modelled. Nothing is transactional: a
/// traversal that fails halfway keeps the writes made before the failure.
#[derive(Debug, Default)]
pub struct MemoryGraph {
    graph: Mutex<Graph>,
}

impl MemoryGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn vertex_count(&self) -> usize {
        self.graph.lock().map(|g| g.vertices.len()).unwrap_or(0)
    }

    pub fn edge_count(&self) -> usize {
        self.graph.lock().map(|g| g.edges.len()).unwrap_or(0)
    }
}

#[async_trait]
impl GraphStore for MemoryGraph {
    async fn submit(&self, traversal: &Traversal) -> Result<Vec<Value>> {
        let mut graph = self
            .graph
            .lock()
            .map_err(|_| Error::Traversal("graph lock poisoned".into()))?;
        let traversers = graph.run(traversal, vec![Traverser::root()])?;
        Ok(traversers.iter().map(|t| graph.render(&t.item)).collect())
    }
}

impl Graph {
    fn run(&mut self, traversal: &Traversal, input: Vec<Traverser>) -> Result<Vec<Traverser>> {
        let mut traversers = input;
        for step in traversal.steps() {
            traversers = self.step(step, traversers)?;
        }
        Ok(traversers)
    }

    /// First object produced by `traversal` when started from `t`.
    fn first(&mut self, traversal: &Traversal, t: &Traverser) -> Result<Option<Item>> {
        Ok(self
            .run(traversal, vec![t.clone()])?
            .into_iter()
            .next()
            .map(|t| t.item))
    }

    fn step(&mut self, step: &Step, input: Vec<Traverser>) -> Result<Vec<Traverser>> {
        let output = match step {
            Step::V => {
                let ids: Vec<ElementId> = self.vertices.keys().copied().collect();
                input
                    .iter()
                    .flat_map(|t| ids.iter().map(move |id| t.walk(Item::Vertex(*id))))
                    .collect()
            }
            Step::E => {
                let ids: Vec<ElementId> = self.edges.keys().copied().collect();
                input
                    .iter()
                    .flat_map(|t| ids.iter().map(move |id| t.walk(Item::Edge(*id))))
                    .collect()
            }
            Step::AddV(label) => input
                .iter()
                .map(|t| {
                    let id = self.add_vertex(label);
                    t.walk(Item::Vertex(id))
                })
                .collect(),
            Step::AddE { label, from, to } => {
                let mut output = Vec::with_capacity(input.len());
                for t in &input {
                    let current = match t.item {
                        Item::Vertex(id) => id,
                        _ => return Err(Error::Traversal(format!("addE('{}') needs a vertex", label))),
                    };
                    let out_v = match from {
                        Some(from) => self.endpoint(from, t)?,
                        None => current,
                    };
                    let in_v = match to {
                        Some(to) => self.endpoint(to, t)?,
                        None => current,
                    };
                    let id = self.add_edge(label, out_v, in_v);
                    output.push(t.walk(Item::Edge(id)));
                }
                output
            }
            Step::Property { key, value, .. } => {
                for t in &input {
                    let properties = match t.item {
                        Item::Vertex(id) => self.vertices.get_mut(&id).map(|v| &mut v.properties),
                        Item::Edge(id) => self.edges.get_mut(&id).map(|e| &mut e.properties),
                        _ => None,
                    };
                    match properties {
                        Some(properties) => {
                            properties.insert(key.clone(), value.clone());
                        }
                        None => {
                            return Err(Error::Traversal(format!(
                                "property('{}') needs an element",
                                key
                            )))
                        }
                    }
                }
                input
            }
            Step::Has {
                label,
                key,
                predicate,
            } => input
                .into_iter()
                .filter(|t| match self.element(&t.item) {
                    Some((l, properties)) => {
                        label.as_deref().map_or(true, |label| label == l)
                            && properties
                                .get(key)
                                .map_or(false, |value| matches(predicate, value))
                    }
                    None => false,
                })
                .collect(),
            Step::HasLabel(label) => input
                .into_iter()
                .filter(|t| matches!(self.element(&t.item), Some((l, _)) if l == label.as_str()))
                .collect(),
            Step::Out(label) => self.adjacent(&input, label, true, false),
            Step::In(label) => self.adjacent(&input, label, false, true),
            Step::Both(label) => self.adjacent(&input, label, true, true),
            Step::InE(label) => {
                let mut output = Vec::new();
                for t in &input {
                    if let Item::Vertex(v) = t.item {
                        for (id, edge) in &self.edges {
                            if edge.in_v == v && &edge.label == label {
                                output.push(t.walk(Item::Edge(*id)));
                            }
                        }
                    }
                }
                output
            }
            Step::As(label) => input
                .into_iter()
                .map(|mut t| {
                    t.labels.push((label.clone(), t.item.clone()));
                    t
                })
                .collect(),
            Step::Select(label) => input
                .iter()
                .filter_map(|t| {
                    t.labels
                        .iter()
                        .rev()
                        .find(|(l, _)| l == label)
                        .map(|(_, item)| t.split(item.clone()))
                })
                .collect(),
            Step::SelectColumn(column) => input
                .iter()
                .filter_map(|t| match &t.item {
                    Item::Entry(key, value) => Some(t.split(match column {
                        Column::Keys => (**key).clone(),
                        Column::Values => (**value).clone(),
                    })),
                    _ => None,
                })
                .collect(),
            Step::Identity => input,
            Step::Drop => {
                for t in &input {
                    self.remove(&t.item);
                }
                Vec::new()
            }
            Step::Dedup => {
                let mut seen: Vec<Item> = Vec::new();
                let mut output = Vec::new();
                for t in input {
                    if !seen.contains(&t.item) {
                        seen.push(t.item.clone());
                        output.push(t);
                    }
                }
                output
            }
            Step::Unfold => {
                let mut output = Vec::new();
                for t in input {
                    match &t.item {
                        Item::Map(entries) => output.extend(entries.iter().map(|(k, v)| {
                            t.split(Item::Entry(Box::new(k.clone()), Box::new(v.clone())))
                        })),
                        Item::Path(objects) => {
                            output.extend(objects.iter().map(|o| t.split(o.clone())))
                        }
                        Item::Value(Value::Array(values)) => output.extend(
                            values.iter().map(|v| t.split(Item::Value(v.clone()))),
                        ),
                        _ => output.push(t),
                    }
                }
                output
            }
            Step::Mean => {
                let numbers: Vec<f64> = input
                    .iter()
                    .filter_map(|t| match &t.item {
                        Item::Value(v) => v.as_f64(),
                        _ => None,
                    })
                    .collect();
                if numbers.is_empty() {
                    Vec::new()
                } else {
                    let mean = numbers.iter().sum::<f64>() / numbers.len() as f64;
                    vec![Traverser::detached(Item::Value(json!(mean)))]
                }
            }
            Step::SimplePath => input
                .into_iter()
                .filter(|t| {
                    t.path
                        .iter()
                        .enumerate()
                        .all(|(i, item)| !t.path[..i].contains(item))
                })
                .collect(),
            Step::Values(key) => input
                .iter()
                .filter_map(|t| {
                    self.element(&t.item)
                        .and_then(|(_, properties)| properties.get(key))
                        .map(|value| t.split(Item::Value(value.clone())))
                })
                .collect(),
            Step::ElementMap(keys) => input
                .iter()
                .filter_map(|t| {
                    self.element_map(&t.item, keys)
                        .map(|map| t.split(Item::Value(map)))
                })
                .collect(),
            Step::Where(filter) => {
                let mut output = Vec::new();
                for t in input {
                    if self.first(filter, &t)?.is_some() {
                        output.push(t);
                    }
                }
                output
            }
            Step::Optional(branch) => {
                let mut output = Vec::new();
                for t in input {
                    let results = self.run(branch, vec![t.clone()])?;
                    if results.is_empty() {
                        output.push(t);
                    } else {
                        output.extend(results);
                    }
                }
                output
            }
            Step::Union(branches) => {
                let mut output = Vec::new();
                for branch in branches {
                    output.extend(self.run(branch, input.clone())?);
                }
                output
            }
            Step::RepeatUntil { body, until } => self.repeat_until(body, until, input)?,
            Step::Path(by) => {
                let mut output = Vec::with_capacity(input.len());
                for t in &input {
                    let mut objects = Vec::with_capacity(t.path.len());
                    for item in &t.path {
                        let object = match by {
                            Some(by) => self
                                .first(by, &Traverser::detached(item.clone()))?
                                .unwrap_or_else(|| item.clone()),
                            None => item.clone(),
                        };
                        objects.push(object);
                    }
                    output.push(t.split(Item::Path(objects)));
                }
                output
            }
            Step::Group { key, value } => self.group(key, value, input)?,
            Step::Order { by, order } => {
                let mut keyed: Vec<(Value, Traverser)> = input
                    .into_iter()
                    .map(|t| (self.sort_key(&t.item, by), t))
                    .collect();
                keyed.sort_by(|(a, _), (b, _)| match order {
                    Order::Asc => compare(a, b),
                    Order::Desc => compare(b, a),
                });
                keyed.into_iter().map(|(_, t)| t).collect()
            }
            Step::Limit(limit) => {
                let mut input = input;
                input.truncate(*limit);
                input
            }
            Step::Project(projections) => {
                let mut output = Vec::with_capacity(input.len());
                for t in &input {
                    let mut entries = Vec::with_capacity(projections.len());
                    for (key, by) in projections {
                        let value = self
                            .first(by, t)?
                            .unwrap_or(Item::Value(Value::Null));
                        entries.push((Item::Value(Value::String(key.clone())), value));
                    }
                    output.push(t.split(Item::Map(entries)));
                }
                output
            }
        };
        Ok(output)
    }

    fn add_vertex(&mut self, label: &str) -> ElementId {
        self.next_id += 1;
        self.vertices.insert(
            self.next_id,
            Vertex {
                label: label.into(),
                properties: BTreeMap::new(),
            },
        );
        self.next_id
    }

    fn add_edge(&mut self, label: &str, out_v: ElementId, in_v: ElementId) -> ElementId {
        self.next_id += 1;
        self.edges.insert(
            self.next_id,
            Edge {
                label: label.into(),
                out_v,
                in_v,
                properties: BTreeMap::new(),
            },
        );
        self.next_id
    }

    fn endpoint(&mut self, traversal: &Traversal, t: &Traverser) -> Result<ElementId> {
        match self.first(traversal, t)? {
            Some(Item::Vertex(id)) => Ok(id),
            _ => Err(Error::Traversal(format!(
                "The provided traverser does not map to a value: {}",
                traversal
            ))),
        }
    }

    /// Dropping a vertex takes its incident edges with it.
    fn remove(&mut self, item: &Item) {
        match item {
            Item::Vertex(id) => {
                if self.vertices.remove(id).is_some() {
                    self.edges.retain(|_, e| e.out_v != *id && e.in_v != *id);
                }
            }
            Item::Edge(id) => {
                self.edges.remove(id);
            }
            _ => {}
        }
    }

    fn element(&self, item: &Item) -> Option<(&str, &BTreeMap<String, Value>)> {
        match item {
            Item::Vertex(id) => self
                .vertices
                .get(id)
                .map(|v| (v.label.as_str(), &v.properties)),
            Item::Edge(id) => self
                .edges
                .get(id)
                .map(|e| (e.label.as_str(), &e.properties)),
            _ => None,
        }
    }

    fn adjacent(&self, input: &[Traverser], label: &str, out: bool, inbound: bool) -> Vec<Traverser> {
        let mut output = Vec::new();
        for t in input {
            let v = match t.item {
                Item::Vertex(v) => v,
                _ => continue,
            };
            let edges = self.edges.values().filter(|e| e.label == label);
            if out {
                for edge in edges.clone().filter(|e| e.out_v == v) {
                    output.push(t.walk(Item::Vertex(edge.in_v)));
                }
            }
            if inbound {
                for edge in edges.filter(|e| e.in_v == v) {
                    output.push(t.walk(Item::Vertex(edge.out_v)));
                }
            }
        }
        output
    }

    fn repeat_until(
        &mut self,
        body: &Traversal,
        until: &Traversal,
        input: Vec<Traverser>,
    ) -> Result<Vec<Traverser>> {
        // A simple path never visits more vertices than the graph holds.
        let max_loops = self.vertices.len() + 1;
        let mut emitted = Vec::new();
        let mut frontier = input;
        let mut loops = 0;
        while !frontier.is_empty() {
            if loops > max_loops {
                return Err(Error::Traversal(format!(
                    "repeat({}) did not terminate",
                    body
                )));
            }
            let mut next = Vec::new();
            for t in frontier {
                if self.first(until, &t)?.is_some() {
                    emitted.push(t);
                } else {
                    next.push(t);
                }
            }
            frontier = self.run(body, next)?;
            loops += 1;
        }
        Ok(emitted)
    }

    fn group(
        &mut self,
        key: &Traversal,
        value: &Traversal,
        input: Vec<Traverser>,
    ) -> Result<Vec<Traverser>> {
        let mut groups: Vec<(Item, Vec<Traverser>)> = Vec::new();
        for t in input {
            let k = match self.first(key, &t)? {
                Some(k) => k,
                None => continue,
            };
            match groups.iter_mut().find(|(existing, _)| *existing == k) {
                Some((_, members)) => members.push(t),
                None => groups.push((k, vec![t])),
            }
        }

        let reducing = value.steps().last().map_or(false, Step::is_reducing);
        let mut entries = Vec::with_capacity(groups.len());
        for (k, members) in groups {
            let results = self.run(value, members)?;
            let v = if reducing {
                results
                    .into_iter()
                    .next()
                    .map(|t| t.item)
                    .unwrap_or(Item::Value(Value::Null))
            } else {
                Item::Value(Value::Array(
                    results.iter().map(|t| self.render(&t.item)).collect(),
                ))
            };
            entries.push((k, v));
        }
        Ok(vec![Traverser::detached(Item::Map(entries))])
    }

    fn sort_key(&self, item: &Item, by: &OrderBy) -> Value {
        match (by, item) {
            (OrderBy::Identity, item) => self.render(item),
            (OrderBy::Column(Column::Keys), Item::Entry(key, _)) => self.render(key),
            (OrderBy::Column(Column::Values), Item::Entry(_, value)) => self.render(value),
            (OrderBy::Property(key), Item::Value(Value::Object(map))) => {
                map.get(key).cloned().unwrap_or(Value::Null)
            }
            (OrderBy::Property(key), item) => self
                .element(item)
                .and_then(|(_, properties)| properties.get(key))
                .cloned()
                .unwrap_or(Value::Null),
            _ => Value::Null,
        }
    }

    fn element_map(&self, item: &Item, keys: &[String]) -> Option<Value> {
        let (id, label, properties) = match item {
            Item::Vertex(id) => self
                .vertices
                .get(id)
                .map(|v| (*id, v.label.as_str(), &v.properties))?,
            Item::Edge(id) => self
                .edges
                .get(id)
                .map(|e| (*id, e.label.as_str(), &e.properties))?,
            _ => return None,
        };
        let mut map = Map::new();
        map.insert("id".into(), json!(id));
        map.insert("label".into(), json!(label));
        for (key, value) in properties {
            if keys.is_empty() || keys.contains(key) {
                map.insert(key.clone(), value.clone());
            }
        }
        Some(Value::Object(map))
    }

    /// Serialize an object the way GraphSON 1.0 would.
    fn render(&self, item: &Item) -> Value {
        match item {
            Item::Vertex(id) => match self.vertices.get(id) {
                Some(v) => {
                    let properties: Map<String, Value> = v
                        .properties
                        .iter()
                        .map(|(k, value)| (k.clone(), json!([{ "value": value }])))
                        .collect();
                    json!({ "id": id, "label": v.label, "type": "vertex", "properties": properties })
                }
                None => Value::Null,
            },
            Item::Edge(id) => match self.edges.get(id) {
                Some(e) => json!({
                    "id": id,
                    "label": e.label,
                    "type": "edge",
                    "outV": e.out_v,
                    "inV": e.in_v,
                    "properties": e.properties,
                }),
                None => Value::Null,
            },
            Item::Value(value) => value.clone(),
            Item::Entry(key, value) => {
                let mut map = Map::new();
                map.insert(self.key_string(key), self.render(value));
                Value::Object(map)
            }
            Item::Map(entries) => Value::Object(
                entries
                    .iter()
                    .map(|(k, v)| (self.key_string(k), self.render(v)))
                    .collect(),
            ),
            Item::Path(objects) => json!({
                "labels": objects.iter().map(|_| json!([])).collect::<Vec<_>>(),
                "objects": objects.iter().map(|o| self.render(o)).collect::<Vec<_>>(),
            }),
        }
    }

    fn key_string(&self, item: &Item) -> String {
        match item {
            Item::Value(Value::String(s)) => s.clone(),
            Item::Vertex(id) => format!("v[{}]", id),
            Item::Edge(id) => format!("e[{}]", id),
            other => self.render(other).to_string(),
        }
    }
}

fn matches(predicate: &P, value: &Value) -> bool {
    match predicate {
        P::Eq(expected) => same(value, expected),
        P::Neq(expected) => !same(value, expected),
        P::Within(candidates) => candidates.iter().any(|c| same(value, c)),
        P::Gte(bound) => {
            comparable(value, bound) && compare(value, bound) != Ordering::Less
        }
    }
}

/// Numbers compare by value, so `4` matches `4.0`.
fn same(a: &Value, b: &Value) -> bool {
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x == y,
        _ => a == b,
    }
}

fn comparable(a: &Value, b: &Value) -> bool {
    matches!(
        (a, b),
        (Value::Number(_), Value::Number(_))
            | (Value::String(_), Value::String(_))
            | (Value::Bool(_), Value::Bool(_))
    )
}

fn rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

fn compare(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => {
            let (x, y) = (x.as_f64().unwrap_or(0.0), y.as_f64().unwrap_or(0.0));
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        _ => rank(a).cmp(&rank(b)),
    }
}
