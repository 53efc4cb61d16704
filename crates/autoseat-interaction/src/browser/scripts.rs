//! JavaScript snippets evaluated inside the agent page.
//!
//! The agent UI is an AngularJS application whose internal wiring is not
//! stable across sessions, so its scope is reached through an ordered list
//! of candidate accessors (see [`scope_accessors`]). Controls are always
//! located by exact visible text, never by position in the DOM.

use serde_json::Value;

/// Ancestor scopes visited by the `$parent` walk before giving up.
pub const MAX_SCOPE_DEPTH: usize = 8;

const IDENTITY_PROP: &str = "currentLeadId";
const INFO_PROP: &str = "leadInfo";
const PHONE_STATE_PROP: &str = "phoneState";
const AVAILABILITY_SETTER: &str = "changeAvailability";

/// A named JS expression that evaluates to an Angular scope or `null`.
#[derive(Debug, Clone)]
pub struct ScopeAccessor {
    pub name: &'static str,
    expression: String,
}

impl ScopeAccessor {
    pub fn expression(&self) -> &str {
        &self.expression
    }
}

/// Candidate accessors in probe order: direct, root, ancestor walk.
pub fn scope_accessors() -> Vec<ScopeAccessor> {
    let direct = "(window.angular && angular.element(document.querySelector('[ng-controller]')).scope()) || null";
    let root = "(function () { var inj = window.angular && angular.element(document.body).injector(); \
                return inj ? inj.get('$rootScope') : null; })()";
    let walk = format!(
        "(function () {{ \
           var s = window.angular && angular.element(document.querySelector('[ng-controller]')).scope(); \
           for (var depth = 0; s && depth < {max}; depth++) {{ \
             if (s.{identity} !== undefined || typeof s.{setter} === 'function') return s; \
             s = s.$parent; \
           }} \
           return null; \
         }})()",
        max = MAX_SCOPE_DEPTH,
        identity = IDENTITY_PROP,
        setter = AVAILABILITY_SETTER,
    );

    vec![
        ScopeAccessor {
            name: "direct-scope",
            expression: direct.to_string(),
        },
        ScopeAccessor {
            name: "root-scope",
            expression: root.to_string(),
        },
        ScopeAccessor {
            name: "ancestor-walk",
            expression: walk,
        },
    ]
}

/// Reads identity, info, phone state and session ids from the scope.
///
/// Evaluates to `null` when the accessor yields no scope or a scope that
/// carries none of the call-state properties.
pub fn read_call_state(accessor: &ScopeAccessor) -> String {
    format!(
        "(function () {{ try {{ \
           var s = {scope}; \
           if (!s || (s.{identity} === undefined && s.{phone} === undefined)) return null; \
           var id = s.{identity}; \
           var info = (id != null && s.{info}) ? (s.{info}[id] || null) : null; \
           return {{ \
             identity: id == null ? null : id, \
             info: info ? JSON.parse(JSON.stringify(info)) : null, \
             phoneState: s.{phone} == null ? null : Number(s.{phone}), \
             sessionId: s.sessionId || null, \
             agentLogId: s.agentLogId || null \
           }}; \
         }} catch (e) {{ return null; }} }})()",
        scope = accessor.expression(),
        identity = IDENTITY_PROP,
        info = INFO_PROP,
        phone = PHONE_STATE_PROP,
    )
}

/// Calls the scope's availability setter. Evaluates to `"ok"`, `"missing"`
/// or `"error: ..."`.
pub fn invoke_availability_setter(accessor: &ScopeAccessor, code: &str) -> String {
    format!(
        "(function () {{ try {{ \
           var s = {scope}; \
           if (!s || typeof s.{setter} !== 'function') return 'missing'; \
           s.{setter}({code}); \
           if (typeof s.$applyAsync === 'function') s.$applyAsync(); \
           return 'ok'; \
         }} catch (e) {{ return 'error: ' + e; }} }})()",
        scope = accessor.expression(),
        setter = AVAILABILITY_SETTER,
        code = js_string(code),
    )
}

/// Clicks the innermost visible, enabled element whose trimmed text equals
/// `label`. Evaluates to `"clicked"`, `"disabled"`, `"hidden"` or `"missing"`.
pub fn click_by_text(label: &str) -> String {
    format!(
        "(function (label) {{ \
           var nodes = document.querySelectorAll('button, a, [role=\"button\"], li, span, div, label'); \
           var seen = null; \
           for (var i = nodes.length - 1; i >= 0; i--) {{ \
             var el = nodes[i]; \
             if ((el.innerText || el.textContent || '').trim() !== label) continue; \
             var style = window.getComputedStyle(el); \
             if (el.offsetParent === null || style.visibility === 'hidden' || style.display === 'none') {{ \
               seen = seen || 'hidden'; continue; \
             }} \
             if (el.disabled || el.getAttribute('aria-disabled') === 'true' || el.classList.contains('disabled')) {{ \
               seen = 'disabled'; continue; \
             }} \
             el.click(); \
             return 'clicked'; \
           }} \
           return seen || 'missing'; \
         }})({label})",
        label = js_string(label),
    )
}

/// Quotes a string as a JS literal.
fn js_string(text: &str) -> String {
    Value::String(text.to_string()).to_string()
}
