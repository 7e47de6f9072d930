// Copyright 2025 Cowboy AI, LLC.

//! Synthesized property accessors
//!
//! Installing a [`Property`] builds one `PropertyAccessor` per class: a
//! read function and a write function chosen from the property's
//! declaration. Instances dispatch through the class's accessor table, so the
//! choice of strategy is made once at composition time.
//!
//! Read precedence: getter override, stored value, factory, expression,
//! declared value, type default.
//!
//! Write pipeline:
//!
//! ```text
//! old = stored value or static default (factory/expression are not forced)
//! v   = adapt(old, v)
//! v   = preSet(old, v)
//! required check, assertValue(v)
//! commit v
//! publish ["propertyChange", name] [name, old, v]   if !is(old, v) and listened
//! postSet(old, v)
//! ```

use std::fmt;
use std::rc::Rc;

use tracing::trace;

use crate::errors::{AxiomError, AxiomResult};
use crate::instance::Obj;
use crate::observer_bus::listener;
use crate::property::Property;
use crate::subscription::Subscription;
use crate::value::Value;

/// Topic prefix for property change notifications
pub const PROPERTY_CHANGE: &str = "propertyChange";

type ReadFn = Rc<dyn Fn(&Obj) -> AxiomResult<Value>>;
type WriteFn = Rc<dyn Fn(&Obj, Value) -> AxiomResult<()>>;

/// Read/write pair synthesized for one property of one class
#[derive(Clone)]
pub struct PropertyAccessor {
    property: Rc<Property>,
    read: ReadFn,
    write: WriteFn,
}

impl PropertyAccessor {
    /// Property this accessor was synthesized from
    pub fn property(&self) -> &Rc<Property> {
        &self.property
    }

    /// Property name
    pub fn name(&self) -> &str {
        self.property.name()
    }

    /// Read the property on `obj`
    pub fn read(&self, obj: &Obj) -> AxiomResult<Value> {
        (self.read)(obj)
    }

    /// Write the property on `obj`
    pub fn write(&self, obj: &Obj, value: Value) -> AxiomResult<()> {
        (self.write)(obj, value)
    }
}

impl fmt::Debug for PropertyAccessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertyAccessor")
            .field("property", &self.property.name())
            .finish()
    }
}

/// Build the accessor pair for `property`
pub(crate) fn synthesize(property: Rc<Property>) -> PropertyAccessor {
    let read: ReadFn = if let Some(getter) = property.getter.clone() {
        Rc::new(move |obj: &Obj| getter(obj))
    } else if property.factory.is_some() {
        let p = property.clone();
        Rc::new(move |obj: &Obj| factory_read(obj, &p))
    } else if property.expression.is_some() {
        let p = property.clone();
        Rc::new(move |obj: &Obj| expression_read(obj, &p))
    } else {
        let p = property.clone();
        Rc::new(move |obj: &Obj| Ok(obj.stored(p.name()).unwrap_or_else(|| p.default_value())))
    };

    let write: WriteFn = match property.setter.clone() {
        Some(setter) => Rc::new(move |obj: &Obj, value: Value| setter(obj, value)),
        None => {
            let p = property.clone();
            Rc::new(move |obj: &Obj, value: Value| write_value(obj, &p, value, true))
        }
    };

    PropertyAccessor { property, read, write }
}

/// Value seen as "old" by the write pipeline. Lazy defaults are not forced.
fn old_value(obj: &Obj, property: &Property) -> Value {
    match obj.stored(property.name()) {
        Some(value) => value,
        None if property.has_lazy_default() => Value::Undefined,
        None => property.default_value(),
    }
}

/// Run the write pipeline; `notify` is off while a factory materializes
pub(crate) fn write_value(
    obj: &Obj,
    property: &Property,
    value: Value,
    notify: bool,
) -> AxiomResult<()> {
    let name = property.name();
    let old = old_value(obj, property);

    let mut value = property.run_adapt(obj, &old, value);
    if let Some(pre_set) = &property.pre_set {
        value = pre_set(obj, &old, value);
    }
    if property.is_required() && value.is_empty() {
        return Err(AxiomError::RequiredProperty {
            class: obj.class().name().to_string(),
            property: name.to_string(),
        });
    }
    if let Some(assert_value) = &property.assert_value {
        assert_value(obj, &value)?;
    }

    obj.store(name, value.clone());
    if property.expression.is_some() {
        drop_expression_state(obj, name);
    }

    if notify && !old.is(&value) {
        let topic = [PROPERTY_CHANGE, name];
        if obj.has_listeners(&topic) {
            obj.publish(&topic, vec![Value::str(name), old.clone(), value.clone()])?;
        }
    }

    if let Some(post_set) = &property.post_set {
        post_set(obj, &old, &value)?;
    }
    Ok(())
}

fn factory_read(obj: &Obj, property: &Property) -> AxiomResult<Value> {
    let name = property.name();
    if let Some(value) = obj.stored(name) {
        return Ok(value);
    }
    let Some(factory) = property.factory.clone() else {
        return Ok(property.default_value());
    };
    if !obj.private_mut().factory_in_progress.insert(name.to_string()) {
        // Re-entrant read from inside the factory itself.
        return Ok(Value::Undefined);
    }
    trace!(class = obj.class().name(), property = name, "running factory");
    let produced = factory(obj);
    let result = write_value(obj, property, produced, false);
    obj.private_mut().factory_in_progress.remove(name);
    result?;
    Ok(obj.stored(name).unwrap_or_default())
}

fn expression_read(obj: &Obj, property: &Property) -> AxiomResult<Value> {
    let name = property.name();
    if let Some(value) = obj.stored(name) {
        return Ok(value);
    }
    if let Some(cached) = obj.private().expression_cache.get(name) {
        return Ok(cached.clone());
    }
    let Some(expression) = property.expression.clone() else {
        return Ok(property.default_value());
    };

    if !obj.private_mut().expression_in_progress.insert(name.to_string()) {
        return Err(AxiomError::CyclicExpression {
            class: obj.class().name().to_string(),
            property: name.to_string(),
        });
    }
    let args = expression
        .args
        .iter()
        .map(|dep| obj.get(dep))
        .collect::<AxiomResult<Vec<_>>>();
    obj.private_mut().expression_in_progress.remove(name);
    let value = (expression.code)(&args?);

    let watchers = Subscription::group(expression.args.iter().map(|dep| {
        let weak = obj.downgrade();
        let target = name.to_string();
        obj.sub(
            &[PROPERTY_CHANGE, dep.as_str()],
            listener(move |_, _| match weak.upgrade() {
                Some(obj) => invalidate_expression(&obj, &target),
                None => Ok(()),
            }),
        )
    }));

    let previous = {
        let mut private = obj.private_mut();
        private.expression_cache.insert(name.to_string(), value.clone());
        private.expression_subs.insert(name.to_string(), watchers)
    };
    if let Some(previous) = previous {
        previous.detach();
    }
    Ok(value)
}

/// Drop the cached expression value and its dependency subscriptions, then
/// tell listeners the value may have changed.
fn invalidate_expression(obj: &Obj, name: &str) -> AxiomResult<()> {
    let old = drop_expression_state(obj, name);
    if obj.has_own_property(name) {
        return Ok(());
    }
    let topic = [PROPERTY_CHANGE, name];
    if obj.has_listeners(&topic) {
        obj.publish(
            &topic,
            vec![Value::str(name), old.unwrap_or_default(), Value::Undefined],
        )?;
    }
    Ok(())
}

fn drop_expression_state(obj: &Obj, name: &str) -> Option<Value> {
    let (cached, watchers) = {
        let mut private = obj.private_mut();
        (
            private.expression_cache.remove(name),
            private.expression_subs.remove(name),
        )
    };
    if let Some(watchers) = watchers {
        watchers.detach();
    }
    cached
}

/// Reset `property` on `obj` to its default; always notifies listeners
pub(crate) fn clear(obj: &Obj, property: &Property) -> AxiomResult<()> {
    let name = property.name();
    let old = obj.unstore(name);
    if property.expression.is_some() {
        drop_expression_state(obj, name);
    }
    let topic = [PROPERTY_CHANGE, name];
    if obj.has_listeners(&topic) {
        obj.publish(
            &topic,
            vec![Value::str(name), old.unwrap_or_default(), Value::Undefined],
        )?;
    }
    Ok(())
}
